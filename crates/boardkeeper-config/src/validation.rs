//! Configuration validation

use crate::schema::{RawConfig, RawMirror, RawRental};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Board '{board_id}': {message}")]
    BoardError { board_id: String, message: String },

    #[error("Duplicate board ID: {0}")]
    DuplicateBoardId(String),

    #[error("At least one board must be configured")]
    NoBoards,

    #[error("At least one administrator must be configured")]
    NoAdmins,

    #[error("rental.{field}: {message}")]
    RentalError { field: &'static str, message: String },

    #[error("mirror.{field}: {message}")]
    MirrorError { field: &'static str, message: String },
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.admins.is_empty() {
        errors.push(ValidationError::NoAdmins);
    }

    if config.boards.is_empty() {
        errors.push(ValidationError::NoBoards);
    }

    let mut seen_ids = HashSet::new();
    for board in &config.boards {
        if board.id.trim().is_empty() {
            errors.push(ValidationError::BoardError {
                board_id: board.id.clone(),
                message: "id cannot be empty".into(),
            });
        }
        if board.name.trim().is_empty() {
            errors.push(ValidationError::BoardError {
                board_id: board.id.clone(),
                message: "name cannot be empty".into(),
            });
        }
        if !seen_ids.insert(&board.id) {
            errors.push(ValidationError::DuplicateBoardId(board.id.clone()));
        }
    }

    errors.extend(validate_rental(&config.rental));

    if let Some(mirror) = &config.mirror {
        errors.extend(validate_mirror(mirror));
    }

    errors
}

fn validate_rental(rental: &RawRental) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !rental.hourly_rate.is_finite() || rental.hourly_rate <= 0.0 {
        errors.push(ValidationError::RentalError {
            field: "hourly_rate",
            message: format!("must be a positive number, got {}", rental.hourly_rate),
        });
    }

    let min_hours = rental.min_hours.unwrap_or(crate::DEFAULT_MIN_HOURS);
    let max_hours = rental.max_hours.unwrap_or(crate::DEFAULT_MAX_HOURS);

    if !min_hours.is_finite() || min_hours <= 0.0 {
        errors.push(ValidationError::RentalError {
            field: "min_hours",
            message: format!("must be a positive number, got {}", min_hours),
        });
    }

    if !max_hours.is_finite() || max_hours < min_hours {
        errors.push(ValidationError::RentalError {
            field: "max_hours",
            message: format!("must be at least min_hours ({}), got {}", min_hours, max_hours),
        });
    }

    if rental.warning_lead_seconds == Some(0) {
        errors.push(ValidationError::RentalError {
            field: "warning_lead_seconds",
            message: "must be greater than zero".into(),
        });
    }

    if rental.history_page_size == Some(0) {
        errors.push(ValidationError::RentalError {
            field: "history_page_size",
            message: "must be greater than zero".into(),
        });
    }

    errors
}

fn validate_mirror(mirror: &RawMirror) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if mirror.endpoint.trim().is_empty() {
        errors.push(ValidationError::MirrorError {
            field: "endpoint",
            message: "cannot be empty".into(),
        });
    }

    if mirror.spreadsheet_id.trim().is_empty() {
        errors.push(ValidationError::MirrorError {
            field: "spreadsheet_id",
            message: "cannot be empty".into(),
        });
    }

    if !mirror.view_url_template.contains("{sheet_id}") {
        errors.push(ValidationError::MirrorError {
            field: "view_url_template",
            message: "must contain the {sheet_id} placeholder".into(),
        });
    }

    if mirror.max_attempts == Some(0) {
        errors.push(ValidationError::MirrorError {
            field: "max_attempts",
            message: "must be greater than zero".into(),
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawBoard, RawServiceConfig};

    fn base_config() -> RawConfig {
        RawConfig {
            config_version: 1,
            admins: vec![1],
            service: RawServiceConfig::default(),
            rental: RawRental {
                hourly_rate: 500.0,
                min_hours: None,
                max_hours: None,
                warning_lead_seconds: None,
                history_page_size: None,
            },
            boards: vec![RawBoard {
                id: "1".into(),
                name: "Alpha".into(),
            }],
            mirror: None,
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(validate_config(&base_config()).is_empty());
    }

    #[test]
    fn test_duplicate_board_detection() {
        let mut config = base_config();
        config.boards.push(RawBoard {
            id: "1".into(),
            name: "Alpha again".into(),
        });

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateBoardId(id) if id == "1")));
    }

    #[test]
    fn test_missing_admins_and_boards() {
        let mut config = base_config();
        config.admins.clear();
        config.boards.clear();

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoAdmins)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoBoards)));
    }

    #[test]
    fn test_rental_limits() {
        let mut config = base_config();
        config.rental.hourly_rate = 0.0;
        config.rental.min_hours = Some(2.0);
        config.rental.max_hours = Some(1.0);
        config.rental.warning_lead_seconds = Some(0);

        let fields: Vec<_> = validate_config(&config)
            .into_iter()
            .filter_map(|e| match e {
                ValidationError::RentalError { field, .. } => Some(field),
                _ => None,
            })
            .collect();

        assert_eq!(fields, vec!["hourly_rate", "max_hours", "warning_lead_seconds"]);
    }

    #[test]
    fn test_mirror_template_placeholder() {
        let mut config = base_config();
        config.mirror = Some(RawMirror {
            endpoint: "https://sheets.example/append".into(),
            spreadsheet_id: "abc".into(),
            view_url_template: "https://sheets.example/view".into(),
            auth_token: None,
            max_attempts: Some(0),
            initial_backoff_ms: None,
        });

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);
    }
}
