//! SQL quoting and input validation.
//!
//! Profiled datasets come with arbitrary headers ("Customer Name",
//! "rate%", "a\"b"), so identifiers are always quoted rather than
//! matched against an allow-list. Every query the crate generates goes
//! through [`SqlSecurity::quote_identifier`].

use crate::error::{ProfileError, ProfileResult};

/// Maximum identifier length accepted in generated SQL.
const MAX_IDENTIFIER_LENGTH: usize = 1024;

/// SQL identifier and literal quoting utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Quotes a SQL identifier (table or column name).
    ///
    /// The identifier is wrapped in double quotes and any internal double
    /// quote is doubled, so the result is always a single identifier token.
    ///
    /// # Examples
    /// ```rust
    /// use term_profile::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("id").unwrap(), "\"id\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::quote_identifier("").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> ProfileResult<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates an identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> ProfileResult<()> {
        if identifier.is_empty() {
            return Err(ProfileError::invalid_data(
                "SQL identifier cannot be empty",
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ProfileError::invalid_data(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} bytes)"
            )));
        }

        InputValidator::validate_no_null_bytes(identifier, "SQL identifier")
    }

    /// Quotes a string literal, doubling single quotes.
    pub fn quote_literal(value: &str) -> ProfileResult<String> {
        InputValidator::validate_no_null_bytes(value, "SQL literal")?;
        Ok(format!("'{}'", value.replace('\'', "''")))
    }
}

/// Input validation for configuration values.
pub struct InputValidator;

impl InputValidator {
    /// Validates that a numeric value is finite.
    pub fn validate_threshold(value: f64, name: &str) -> ProfileResult<()> {
        if !value.is_finite() {
            return Err(ProfileError::configuration(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates a ratio in the half-open range (0.0, 1.0].
    pub fn validate_ratio(value: f64, name: &str) -> ProfileResult<()> {
        Self::validate_threshold(value, name)?;

        if value <= 0.0 || value > 1.0 {
            return Err(ProfileError::configuration(format!(
                "Invalid {name} value: must be in (0.0, 1.0], got {value}"
            )));
        }
        Ok(())
    }

    /// Validates a strictly positive finite value.
    pub fn validate_positive(value: f64, name: &str) -> ProfileResult<()> {
        Self::validate_threshold(value, name)?;

        if value <= 0.0 {
            return Err(ProfileError::configuration(format!(
                "Invalid {name} value: must be positive, got {value}"
            )));
        }
        Ok(())
    }

    /// Validates that a string doesn't contain null bytes.
    pub fn validate_no_null_bytes(value: &str, name: &str) -> ProfileResult<()> {
        if value.contains('\0') {
            return Err(ProfileError::invalid_data(format!(
                "{name} cannot contain null bytes"
            )));
        }
        Ok(())
    }
}
