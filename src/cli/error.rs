// Error handling utilities for consistent error messages and exit codes

use std::process;
use crate::models::is_valid_stage_name;
use crate::repo::StoreError;
use crate::tracker::TrackerError;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, rejected events, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for unexpected system failures, database corruption, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Whether an error is the user's to fix rather than a system failure
pub fn is_user_error(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<TrackerError>().is_some() {
        return true;
    }
    matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound { .. }) | Some(StoreError::AlreadyExists { .. })
    )
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate tracking number format (alphanumeric, dots, underscores, hyphens)
pub fn validate_tracking_number(value: &str) -> Result<(), String> {
    validate_non_empty(value, "Tracking number")?;

    if value.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(format!("Invalid tracking number: '{}'. Tracking numbers can only contain letters, numbers, dots, underscores, and hyphens.", value))
    }
}

/// Validate checkpoint name format
pub fn validate_checkpoint(name: &str) -> Result<(), String> {
    validate_non_empty(name, "Checkpoint name")?;

    if is_valid_stage_name(name) {
        Ok(())
    } else {
        Err(format!("Invalid checkpoint: '{}'. Checkpoint names can only contain letters, numbers, underscores, hyphens, and dots.", name))
    }
}

/// Validate user identity (e.g. an email address); no whitespace allowed
pub fn validate_identity(identity: &str) -> Result<(), String> {
    validate_non_empty(identity, "User identity")?;

    if identity.chars().any(char::is_whitespace) {
        Err(format!("Invalid user identity: '{}'. Identities cannot contain whitespace.", identity))
    } else {
        Ok(())
    }
}

/// Parse a `key=value` truck detail
pub fn parse_detail(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Invalid detail: '{}'. Details must be written as key=value.", arg)),
    }
}
