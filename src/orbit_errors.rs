use roots::SearchError;
use thiserror::Error;

/// Errors reported by every fallible routine of the crate.
///
/// No variant is ever swallowed or retried internally: tolerances are never
/// silently relaxed, callers decide how to react.
#[derive(Error, Debug, Clone)]
pub enum OrbitError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("{solver} did not converge within {iterations} iterations")]
    Convergence {
        solver: &'static str,
        iterations: usize,
    },

    #[error("Propagation failed: {0}")]
    Propagation(String),
}

impl OrbitError {
    /// Map a failure of the `roots` solvers onto the crate taxonomy.
    ///
    /// Arguments
    /// ---------
    /// * `err` – error returned by `roots`.
    /// * `solver` – static name of the calling solver, used in the message.
    /// * `iterations` – iteration budget that was granted to the root finder.
    pub(crate) fn from_search(err: SearchError, solver: &'static str, iterations: usize) -> Self {
        match err {
            SearchError::NoBracketing => {
                OrbitError::InvalidArgument(format!("{solver}: root is not bracketed"))
            }
            SearchError::NoConvergency | SearchError::ZeroDerivative => {
                OrbitError::Convergence { solver, iterations }
            }
        }
    }
}

impl PartialEq for OrbitError {
    fn eq(&self, other: &Self) -> bool {
        use OrbitError::*;
        match (self, other) {
            (InvalidArgument(a), InvalidArgument(b)) => a == b,
            (InvalidElements(a), InvalidElements(b)) => a == b,
            (DegenerateGeometry(a), DegenerateGeometry(b)) => a == b,
            (Propagation(a), Propagation(b)) => a == b,
            (
                Convergence {
                    solver: s1,
                    iterations: i1,
                },
                Convergence {
                    solver: s2,
                    iterations: i2,
                },
            ) => s1 == s2 && i1 == i2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod orbit_errors_test {
    use super::*;

    #[test]
    fn search_errors_map_to_taxonomy() {
        let e = OrbitError::from_search(SearchError::NoConvergency, "kepler", 50);
        assert_eq!(
            e,
            OrbitError::Convergence {
                solver: "kepler",
                iterations: 50
            }
        );

        let e = OrbitError::from_search(SearchError::NoBracketing, "lambert", 10);
        assert!(matches!(e, OrbitError::InvalidArgument(_)));
    }

    #[test]
    fn display_is_informative() {
        let e = OrbitError::Convergence {
            solver: "hyperbolic kepler",
            iterations: 7,
        };
        assert_eq!(
            e.to_string(),
            "hyperbolic kepler did not converge within 7 iterations"
        );
    }
}
