// erf_mri_core - multi-rate time integration core for a terrain-following
// compressible atmospheric flow solver
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Error taxonomy for the integration core (see `ERROR HANDLING DESIGN` in
//! the design spec). Every fallible entry point returns `Result<_, CoreError>`
//! instead of panicking or aborting the process.

use thiserror::Error;

/// Top-level error type returned by every fallible kernel in this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// An unknown or out-of-range configuration parameter was supplied.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// `detJ <= 0`, a non-monotone `z_nd`, or an empty box list.
    #[error("invalid geometry: {0}")]
    GeometryInvalid(String),

    /// Non-positive density/Exner in the fast vertical solve, or a Thomas
    /// algorithm pivot below the fixed threshold.
    #[error("numerical failure in {where_}: {detail}")]
    NumericalFailure { where_: String, detail: String },

    /// MOST `u*` iteration failed to converge within the iteration cap.
    /// Not automatically fatal -- callers may continue with the fallback
    /// value recorded in the accompanying status mask.
    #[error("MOST iteration failed to converge at column ({i}, {j}) after {iters} iterations")]
    ConvergenceFailure { i: i32, j: i32, iters: u32 },

    /// A boundary-condition handler requested a ghost width exceeding the
    /// halo actually allocated for the field.
    #[error("domain violation: requested ghost width {requested} exceeds halo width {available}")]
    DomainViolation { requested: i32, available: i32 },

    /// A reconstruction kernel was asked for a stencil order it does not
    /// implement. Reachable even past `scheme_for`'s upstream validation,
    /// since `Scheme::select` can still hand a caller-supplied order to the
    /// wrong family of kernel.
    #[error("unsupported {kind} reconstruction order {order}")]
    UnsupportedOrder { kind: String, order: i32 },
}

impl CoreError {
    /// Whether this error kind is ever safe to continue past (matches the
    /// one explicitly non-fatal variant in the taxonomy).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::ConvergenceFailure { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Aggregates per-box failures collected by the stage driver into a single
/// step-level outcome, mirroring "the driver aggregates across ranks and
/// aborts the entire step."
#[derive(Debug, Default)]
pub struct StageErrors {
    errors: Vec<CoreError>,
}

impl StageErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, err: CoreError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.iter().all(CoreError::is_recoverable)
    }

    /// Returns the first fatal error, if any; recoverable errors
    /// (`ConvergenceFailure`) are not reported here.
    pub fn into_result(self) -> CoreResult<Vec<CoreError>> {
        if let Some(fatal) = self.errors.iter().find(|e| !e.is_recoverable()) {
            return Err(fatal.clone());
        }
        Ok(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_failure_is_recoverable() {
        let e = CoreError::ConvergenceFailure { i: 0, j: 0, iters: 25 };
        assert!(e.is_recoverable());
    }

    #[test]
    fn other_kinds_are_fatal() {
        assert!(!CoreError::ConfigInvalid("x".into()).is_recoverable());
        assert!(!CoreError::GeometryInvalid("x".into()).is_recoverable());
        assert!(!CoreError::DomainViolation { requested: 4, available: 3 }.is_recoverable());
    }

    #[test]
    fn stage_errors_promotes_first_fatal() {
        let mut errs = StageErrors::new();
        errs.push(CoreError::ConvergenceFailure { i: 1, j: 2, iters: 25 });
        errs.push(CoreError::DomainViolation { requested: 4, available: 3 });
        let result = errs.into_result();
        assert!(matches!(result, Err(CoreError::DomainViolation { .. })));
    }

    #[test]
    fn stage_errors_ok_when_only_recoverable() {
        let mut errs = StageErrors::new();
        errs.push(CoreError::ConvergenceFailure { i: 1, j: 2, iters: 25 });
        assert!(errs.is_empty());
    }
}
