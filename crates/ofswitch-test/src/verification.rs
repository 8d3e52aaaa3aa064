//! Verification helpers for flat batch results

use ofswitch_batch::{BatchItemId, BatchResult};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected success={expected}, got success={actual}")]
    SuccessMismatch { expected: bool, actual: bool },

    #[error("Expected failed batch orders {expected:?}, got {actual:?}")]
    FailureOrderMismatch { expected: Vec<u32>, actual: Vec<u32> },

    #[error("Failure at batch order {batch_order}: expected id '{expected}', got '{actual}'")]
    FailureIdMismatch {
        batch_order: u32,
        expected: String,
        actual: String,
    },

    #[error("Failures are not sorted by batch order: {orders:?}")]
    Unsorted { orders: Vec<u32> },

    #[error("Expected {expected} errors, found {actual}")]
    ErrorCountMismatch { expected: usize, actual: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Assertions over one [`BatchResult`].
#[derive(Debug)]
pub struct ResultVerifier<'a> {
    result: &'a BatchResult,
}

impl<'a> ResultVerifier<'a> {
    pub fn new(result: &'a BatchResult) -> Self {
        Self { result }
    }

    pub fn assert_success(&self, expected: bool) -> VerifyResult<&Self> {
        if self.result.success != expected {
            return Err(VerificationError::SuccessMismatch {
                expected,
                actual: self.result.success,
            });
        }
        Ok(self)
    }

    /// Failed batch orders must be exactly `expected`, ascending.
    pub fn assert_failed_orders(&self, expected: &[u32]) -> VerifyResult<&Self> {
        self.assert_sorted()?;
        let actual = self.result.failed_orders();
        if actual != expected {
            return Err(VerificationError::FailureOrderMismatch {
                expected: expected.to_vec(),
                actual,
            });
        }
        Ok(self)
    }

    /// The failure at `batch_order` must echo `id`.
    pub fn assert_failure_id(&self, batch_order: u32, id: &BatchItemId) -> VerifyResult<&Self> {
        let failure = self
            .result
            .failures
            .iter()
            .find(|f| f.batch_order == batch_order)
            .ok_or_else(|| VerificationError::FailureOrderMismatch {
                expected: vec![batch_order],
                actual: self.result.failed_orders(),
            })?;
        if &failure.id != id {
            return Err(VerificationError::FailureIdMismatch {
                batch_order,
                expected: id.to_string(),
                actual: failure.id.to_string(),
            });
        }
        Ok(self)
    }

    pub fn assert_error_count(&self, expected: usize) -> VerifyResult<&Self> {
        let actual = self.result.errors.len();
        if actual != expected {
            return Err(VerificationError::ErrorCountMismatch { expected, actual });
        }
        Ok(self)
    }

    pub fn assert_sorted(&self) -> VerifyResult<&Self> {
        let orders = self.result.failed_orders();
        if orders.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(VerificationError::Unsorted { orders });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofswitch_batch::{BatchFailure, ChainError, TypedBatchOutput};
    use ofswitch_session::SessionError;
    use ofswitch_types::GroupId;

    fn failed_result() -> BatchResult {
        let mut result = BatchResult::new();
        result.merge(TypedBatchOutput {
            failures: vec![BatchFailure {
                batch_order: 3,
                id: BatchItemId::Group(GroupId::new(4).unwrap()),
                error: SessionError::ConnectionLost,
            }],
            errors: vec![ChainError::item(3, SessionError::ConnectionLost)],
        });
        result
    }

    #[test]
    fn test_verifier_accepts_matching_result() {
        let result = failed_result();
        ResultVerifier::new(&result)
            .assert_success(false)
            .and_then(|v| v.assert_failed_orders(&[3]))
            .and_then(|v| v.assert_failure_id(3, &BatchItemId::Group(GroupId::new(4).unwrap())))
            .and_then(|v| v.assert_error_count(1))
            .unwrap();
    }

    #[test]
    fn test_verifier_reports_mismatch() {
        let result = failed_result();
        let verifier = ResultVerifier::new(&result);

        let err = verifier.assert_failed_orders(&[2]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected failed batch orders [2], got [3]"
        );
        assert!(verifier.assert_success(true).is_err());
        assert!(format!("{:?}", verifier).starts_with("ResultVerifier"));
        assert!(verifier
            .assert_failure_id(3, &BatchItemId::Group(GroupId::new(5).unwrap()))
            .is_err());
    }
}
