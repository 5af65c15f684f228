//! Domain entities held by the inventory.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::CarStatus;

/// Oldest model year accepted for a listing.
pub const MIN_MODEL_YEAR: i32 = 1900;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealerRecord {
    pub id: Uuid,
    pub name: String,
    pub country_code: String,
    pub city: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarRecord {
    pub id: Uuid,
    pub dealer_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_cents: i64,
    pub mileage_km: i64,
    pub country_code: String,
    pub city: String,
    pub status: CarStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub listed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CarRecord {
    /// Checks field-level invariants.
    pub fn validate(&self, now: OffsetDateTime) -> Result<(), DomainError> {
        require_text("make", &self.make)?;
        require_text("model", &self.model)?;
        validate_country_code(&self.country_code)?;

        let max_year = now.year() + 1;
        if !(MIN_MODEL_YEAR..=max_year).contains(&self.year) {
            return Err(DomainError::validation(format!(
                "year must be between {MIN_MODEL_YEAR} and {max_year}"
            )));
        }
        if self.price_cents < 0 {
            return Err(DomainError::validation("price_cents must not be negative"));
        }
        if self.mileage_km < 0 {
            return Err(DomainError::validation("mileage_km must not be negative"));
        }
        Ok(())
    }
}

impl DealerRecord {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("name", &self.name)?;
        validate_country_code(&self.country_code)
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// ISO 3166-1 alpha-2, upper case.
pub fn validate_country_code(code: &str) -> Result<(), DomainError> {
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "country_code `{code}` must be two upper-case letters"
        )))
    }
}
