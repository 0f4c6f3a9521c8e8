//! Streamer-only resource enforcement: soft/hard doc-count limits and the
//! (best-effort) memory quota.

use crate::config::StreamerLimits;
use crate::error::{RabitqError, Result};

/// Checks `doc_count` (post-insert, i.e. what it would become) against
/// `limits`. Over the soft limit logs a warning and still succeeds; over
/// the hard limit fails with `IndexFull` and performs no insert.
pub fn enforce_doc_limits(doc_count: u64, limits: &StreamerLimits) -> Result<()> {
    if doc_count > limits.docs_hard_limit {
        return Err(RabitqError::IndexFull {
            doc_count,
            hard_limit: limits.docs_hard_limit,
        });
    }
    if doc_count > limits.docs_soft_limit {
        log::warn!(
            "doc_count {doc_count} exceeds soft limit {} (hard limit {})",
            limits.docs_soft_limit,
            limits.docs_hard_limit
        );
    }
    Ok(())
}

/// Checks a prospective growth of `additional_bytes` against
/// `limits.memory_quota` (0 = unlimited), given the bytes already used.
pub fn enforce_memory_quota(used_bytes: u64, additional_bytes: u64, limits: &StreamerLimits) -> Result<()> {
    if limits.memory_quota == 0 {
        return Ok(());
    }
    if used_bytes.saturating_add(additional_bytes) > limits.memory_quota {
        return Err(RabitqError::OutOfMemory(format!(
            "growth of {additional_bytes} bytes would exceed quota {} (currently {used_bytes})",
            limits.memory_quota
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> StreamerLimits {
        StreamerLimits {
            docs_hard_limit: 100,
            docs_soft_limit: 80,
            ..StreamerLimits::new()
        }
    }

    #[test]
    fn under_soft_limit_is_fine() {
        assert!(enforce_doc_limits(10, &limits()).is_ok());
    }

    #[test]
    fn over_soft_under_hard_still_succeeds() {
        assert!(enforce_doc_limits(90, &limits()).is_ok());
    }

    #[test]
    fn over_hard_limit_fails() {
        assert!(matches!(
            enforce_doc_limits(101, &limits()),
            Err(RabitqError::IndexFull { .. })
        ));
    }

    #[test]
    fn zero_quota_is_unlimited() {
        let l = StreamerLimits::new();
        assert!(enforce_memory_quota(u64::MAX - 1, 1000, &l).is_ok());
    }

    #[test]
    fn quota_exceeded_fails() {
        let l = StreamerLimits {
            memory_quota: 100,
            ..StreamerLimits::new()
        };
        assert!(enforce_memory_quota(90, 20, &l).is_err());
    }
}
