// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

use crate::asset::status::Status;
use crate::asset::{AssetKey, AssetKind};
use crate::controller::policies::EmergencyPolicy;
use crate::store::StoreError;

/// Failure of a single-asset engine operation.
///
/// Single-asset operations validate before mutating, so any of these leaves
/// the stored record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    #[error("{asset}: no such asset")]
    NotFound { asset: AssetKey },

    #[error("{asset}: stale version (expected {expected}, current {current})")]
    Conflict {
        asset: AssetKey,
        expected: u64,
        current: u64,
    },

    #[error("{asset}: asset is inactive")]
    InactiveAsset { asset: AssetKey },

    #[error("{asset}: status '{status}' is not legal for a {kind}")]
    InvalidStatus {
        asset: AssetKey,
        kind: AssetKind,
        status: Status,
    },

    #[error("{asset}: no override to clear")]
    NoOverride { asset: AssetKey },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cannot apply {requested} while {active} is active")]
    PolicyConflict {
        active: EmergencyPolicy,
        requested: EmergencyPolicy,
    },

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl OverrideError {
    /// Short machine-readable name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InactiveAsset { .. } => "inactive_asset",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::NoOverride { .. } => "no_override",
            Self::InvalidRequest(_) => "invalid_request",
            Self::PolicyConflict { .. } => "policy_conflict",
            Self::Store(_) => "store",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether re-reading the record and trying again can succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

impl From<StoreError> for OverrideError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { asset } => Self::NotFound { asset },
            StoreError::VersionMismatch {
                asset,
                expected,
                stored,
            } => Self::Conflict {
                asset,
                expected,
                current: stored,
            },
            other => Self::Store(other),
        }
    }
}

/// Returned by batch operations whose result set contains any failure.
#[derive(Debug, Clone, Error)]
#[error("{operation}: {} of {attempted} assets failed", .failures.len())]
pub struct PartialBatchFailure {
    pub operation: String,
    pub attempted: usize,
    pub failures: Vec<(AssetKey, OverrideError)>,
}

/// Failure to parse a textual kind, status, key, or policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown asset kind '{0}'")]
    Kind(String),

    #[error("unknown status '{0}'")]
    Status(String),

    #[error("malformed asset key '{0}' (expected <kind>:<id>)")]
    Key(String),

    #[error("unknown emergency policy '{0}'")]
    Policy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_mismatch_maps_to_conflict() {
        let err: OverrideError = StoreError::VersionMismatch {
            asset: AssetKey::slot("E-12"),
            expected: 4,
            stored: 5,
        }
        .into();
        assert_eq!(
            err,
            OverrideError::Conflict {
                asset: AssetKey::slot("E-12"),
                expected: 4,
                current: 5,
            }
        );
        assert!(err.is_retryable());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn test_partial_failure_message() {
        let failure = PartialBatchFailure {
            operation: "set_manual_override".to_string(),
            attempted: 3,
            failures: vec![(
                AssetKey::slot("E-3"),
                OverrideError::InactiveAsset {
                    asset: AssetKey::slot("E-3"),
                },
            )],
        };
        assert_eq!(
            failure.to_string(),
            "set_manual_override: 1 of 3 assets failed"
        );
    }
}
