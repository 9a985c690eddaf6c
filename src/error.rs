use thiserror::Error;

/// A race that cannot be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("race {race}: malformed participant data: {reason}")]
    MalformedParticipants { race: String, reason: String },

    #[error("race {race}: invalid expected odds {odds}")]
    InvalidOdds { race: String, odds: f64 },

    #[error("race with empty name")]
    MissingName,
}

/// Result reconciliation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("race not found: {0}")]
    RaceNotFound(String),

    #[error("race already resolved: {0}")]
    AlreadyResolved(String),

    #[error("result for {actual} does not match record {expected}")]
    RaceMismatch { expected: String, actual: String },
}

#[cfg(feature = "api")]
pub use api::*;

#[cfg(feature = "api")]
mod api {
    use actix_web::{http::StatusCode, HttpResponse, ResponseError};
    use std::fmt;

    use super::ReconcileError;
    use crate::config::SelectionConfig;
    use crate::models::ErrorResponse;
    use crate::store::StoreError;

    /// Application error types
    #[derive(Debug)]
    pub enum AppError {
        /// Invalid request data
        ValidationError(String),
        /// Result could not be matched to a record
        Reconcile(ReconcileError),
        /// Internal server error
        InternalError(String),
    }

    impl fmt::Display for AppError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
                AppError::Reconcile(err) => write!(f, "Reconcile error: {}", err),
                AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            }
        }
    }

    impl std::error::Error for AppError {}

    impl From<ReconcileError> for AppError {
        fn from(err: ReconcileError) -> Self {
            AppError::Reconcile(err)
        }
    }

    impl From<StoreError> for AppError {
        fn from(err: StoreError) -> Self {
            match err {
                StoreError::Reconcile(inner) => AppError::Reconcile(inner),
                other => AppError::InternalError(other.to_string()),
            }
        }
    }

    impl ResponseError for AppError {
        fn status_code(&self) -> StatusCode {
            match self {
                AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
                AppError::Reconcile(ReconcileError::RaceNotFound(_)) => StatusCode::NOT_FOUND,
                AppError::Reconcile(ReconcileError::AlreadyResolved(_)) => StatusCode::CONFLICT,
                AppError::Reconcile(ReconcileError::RaceMismatch { .. }) => StatusCode::BAD_REQUEST,
                AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }

        fn error_response(&self) -> HttpResponse {
            let (error_code, message) = match self {
                AppError::ValidationError(msg) => ("validation_error", msg.clone()),
                AppError::Reconcile(ReconcileError::RaceNotFound(_)) => {
                    ("race_not_found", self.to_string())
                }
                AppError::Reconcile(ReconcileError::AlreadyResolved(_)) => {
                    ("already_resolved", self.to_string())
                }
                AppError::Reconcile(_) => ("race_mismatch", self.to_string()),
                AppError::InternalError(msg) => ("internal_error", msg.clone()),
            };

            HttpResponse::build(self.status_code()).json(ErrorResponse {
                error: error_code.to_string(),
                message,
            })
        }
    }

    /// Validation functions
    pub fn validate_selection_config(config: &SelectionConfig) -> Result<(), AppError> {
        config
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))
    }

    pub fn validate_finish_order(order: &[u8]) -> Result<(), AppError> {
        if order.is_empty() {
            return Err(AppError::ValidationError(
                "Finish order must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for position in order {
            if *position == 0 || !seen.insert(*position) {
                return Err(AppError::ValidationError(format!(
                    "Finish order has an invalid or repeated position: {}",
                    position
                )));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_validate_selection_config() {
            assert!(validate_selection_config(&SelectionConfig::default()).is_ok());
            let bad = SelectionConfig {
                investment_per_bet: 0,
                ..SelectionConfig::default()
            };
            let err = validate_selection_config(&bad).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

            let nan_odds = SelectionConfig {
                min_odds: f64::NAN,
                ..SelectionConfig::default()
            };
            assert!(validate_selection_config(&nan_odds).is_err());
        }

        #[test]
        fn test_validate_finish_order() {
            assert!(validate_finish_order(&[1, 3, 2, 4, 5, 6]).is_ok());
            assert!(validate_finish_order(&[]).is_err());
            assert!(validate_finish_order(&[1, 1, 2]).is_err());
            assert!(validate_finish_order(&[0, 1, 2]).is_err());
        }

        #[test]
        fn test_error_display() {
            let err = AppError::ValidationError("test error".to_string());
            assert!(err.to_string().contains("Validation error"));
        }

        #[test]
        fn test_error_status_codes() {
            assert_eq!(
                AppError::ValidationError("".to_string()).status_code(),
                StatusCode::BAD_REQUEST
            );
            assert_eq!(
                AppError::from(ReconcileError::RaceNotFound("x".to_string())).status_code(),
                StatusCode::NOT_FOUND
            );
            assert_eq!(
                AppError::from(ReconcileError::AlreadyResolved("x".to_string())).status_code(),
                StatusCode::CONFLICT
            );
            assert_eq!(
                AppError::InternalError("".to_string()).status_code(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_display() {
        let err = ReconcileError::RaceNotFound("住之江12R".to_string());
        assert_eq!(err.to_string(), "race not found: 住之江12R");
    }

    #[test]
    fn test_selection_error_display() {
        let err = SelectionError::MalformedParticipants {
            race: "尼崎11R".to_string(),
            reason: "duplicate position 3".to_string(),
        };
        assert!(err.to_string().contains("尼崎11R"));
        assert!(err.to_string().contains("duplicate position 3"));
    }
}
