// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Retry policies for writes that lose a store race.
//!
//! Only commands that opt in (sensor feed, emergency layer) consult the
//! policy. Staff commands carry the caller's version and surface the
//! conflict instead.

use crate::error::OverrideError;

/// Policy for retrying failed writes.
pub trait RetryPolicy: Send + Sync {
    /// Determine if the write should be retried after `attempt` tries.
    fn should_retry(&self, attempt: u32, error: &OverrideError) -> bool;

    /// Get the maximum number of attempts allowed.
    fn max_attempts(&self) -> u32;
}

/// Retry conflicts a fixed number of times, immediately.
///
/// Conflicts are resolved by re-reading the record, so there is nothing to
/// wait for between attempts.
#[derive(Debug, Clone)]
pub struct FixedAttempts {
    max_attempts: u32,
}

impl FixedAttempts {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for FixedAttempts {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy for FixedAttempts {
    fn should_retry(&self, attempt: u32, error: &OverrideError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        error.is_retryable()
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// No retry policy - fail immediately on error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _attempt: u32, _error: &OverrideError) -> bool {
        false
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}
