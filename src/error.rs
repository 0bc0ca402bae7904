use thiserror::Error;

/// Reasons a network can be rejected or a power flow can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PfError {
    /// Malformed network or options. Never retried.
    #[error("configuration error: {what}")]
    Configuration { what: String },

    /// The Jacobian could not be factored, or the iteration produced
    /// non-finite values.
    #[error("numerical error at iteration {iteration}: {what}")]
    Numerical { iteration: usize, what: String },

    /// The iteration budget ran out before the mismatch met the tolerance.
    #[error("did not converge in {iterations} iterations (max mismatch {mismatch:e} p.u.)")]
    Convergence { iterations: usize, mismatch: f64 },
}

impl PfError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        PfError::Configuration { what: what.into() }
    }

    /// Failures confined to a single scenario, which a sweep may skip.
    pub fn is_scenario_local(&self) -> bool {
        matches!(
            self,
            PfError::Numerical { .. } | PfError::Convergence { .. }
        )
    }
}

pub type PfResult<T> = Result<T, PfError>;
