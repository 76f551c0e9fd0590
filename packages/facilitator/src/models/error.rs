use thiserror::Error;

pub type FacilitatorResult<T> = Result<T, FacilitatorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

/// Every field constraint an entity broke on `save`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {entity}: {}", describe(.violations))]
pub struct ValidationError {
    pub entity: &'static str,
    pub violations: Vec<FieldViolation>,
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FieldViolation {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

#[derive(Debug, Error)]
pub enum FacilitatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {key}")]
    RecordNotFound { entity: &'static str, key: String },

    #[error("transaction submission failed ({call}): {reason}")]
    Submission { call: String, reason: String },

    #[error("proof not yet available for {key} at block {block_height}")]
    ProofUnavailable { key: String, block_height: u64 },

    #[error("malformed {kind} event: field `{field}` {reason}")]
    MalformedEvent {
        kind: String,
        field: String,
        reason: String,
    },

    #[error("chain RPC failed: {0}")]
    Rpc(String),

    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl FacilitatorError {
    pub fn not_found(entity: &'static str, key: impl std::fmt::Debug) -> Self {
        Self::RecordNotFound {
            entity,
            key: format!("{:?}", key),
        }
    }

    pub fn submission(call: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Submission {
            call: call.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_field() {
        let err = ValidationError {
            entity: "message_transfer_request",
            violations: vec![
                FieldViolation::new("amount", "must be greater than zero"),
                FieldViolation::new("beneficiary", "is required"),
            ],
        };

        let text = err.to_string();
        assert!(text.contains("amount must be greater than zero"));
        assert!(text.contains("beneficiary is required"));
        assert_eq!(err.fields(), vec!["amount", "beneficiary"]);
    }

    #[test]
    fn test_only_submission_errors_are_retryable() {
        assert!(FacilitatorError::submission("progressStake", "nonce too low").is_retryable());
        assert!(!FacilitatorError::not_found("gateway", "0xabc").is_retryable());
        assert!(
            !FacilitatorError::ProofUnavailable {
                key: "0x01".into(),
                block_height: 3
            }
            .is_retryable()
        );
    }
}
