//! The dataset submission payload and its validation rules.
//!
//! A [`DatasetRequest`] is decoded from the wire by the API crate and must
//! pass [`DatasetRequest::validate`] before it is fingerprinted or stored.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of a region identifier.
pub const MAX_REGION_LEN: usize = 64;

/// Maximum length of a contact address.
pub const MAX_CONTACT_LEN: usize = 254;

/// Year fields must be exactly four ASCII digits.
fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("year pattern is valid"))
}

// ---------------------------------------------------------------------------
// DatasetRequest
// ---------------------------------------------------------------------------

/// A request for a synthetic population dataset.
///
/// `region`, `year`, and `population` identify the dataset and drive the
/// deduplication fingerprint; `contact_address` is only used to notify the
/// requester once a deferred job finishes and never affects identity.
///
/// All fields arrive as strings, matching the public wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRequest {
    pub region: String,
    pub year: String,
    pub population: String,
    pub contact_address: String,
}

impl DatasetRequest {
    /// Validate all fields.
    ///
    /// Rules:
    /// - `region`: non-empty after trimming, at most [`MAX_REGION_LEN`]
    ///   characters, only alphanumeric, hyphen, or underscore.
    /// - `year`: exactly four ASCII digits.
    /// - `population`: parses as a positive integer.
    /// - `contact_address`: non-empty, contains `@`, at most
    ///   [`MAX_CONTACT_LEN`] characters. Deliverability is the notification
    ///   channel's problem, not a submission-time concern.
    pub fn validate(&self) -> Result<(), CoreError> {
        let region = self.region.trim();
        if region.is_empty() {
            return Err(CoreError::Validation(
                "Region must not be empty".to_string(),
            ));
        }
        if region.len() > MAX_REGION_LEN {
            return Err(CoreError::Validation(format!(
                "Region must not exceed {MAX_REGION_LEN} characters"
            )));
        }
        if !region
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::Validation(
                "Region may only contain alphanumeric, hyphen, or underscore characters"
                    .to_string(),
            ));
        }

        if !year_pattern().is_match(self.year.trim()) {
            return Err(CoreError::Validation(
                "Year must be exactly four digits".to_string(),
            ));
        }

        self.parsed_population()?;

        let contact = self.contact_address.trim();
        if contact.is_empty() {
            return Err(CoreError::Validation(
                "Contact address must not be empty".to_string(),
            ));
        }
        if contact.len() > MAX_CONTACT_LEN {
            return Err(CoreError::Validation(format!(
                "Contact address must not exceed {MAX_CONTACT_LEN} characters"
            )));
        }
        if !contact.contains('@') {
            return Err(CoreError::Validation(
                "Contact address must contain '@'".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the requested population size.
    ///
    /// Returns a validation error when the field is not a positive integer.
    pub fn parsed_population(&self) -> Result<u64, CoreError> {
        let population: u64 = self.population.trim().parse().map_err(|_| {
            CoreError::Validation("Population must be a positive integer".to_string())
        })?;
        if population == 0 {
            return Err(CoreError::Validation(
                "Population must be greater than zero".to_string(),
            ));
        }
        Ok(population)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
