//! Shared domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarStatus {
    Active,
    Sold,
    Hidden,
}

impl CarStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CarStatus::Active => "active",
            CarStatus::Sold => "sold",
            CarStatus::Hidden => "hidden",
        }
    }
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(CarStatus::Active),
            "sold" => Ok(CarStatus::Sold),
            "hidden" => Ok(CarStatus::Hidden),
            other => Err(DomainError::validation(format!(
                "status `{other}` must be one of active, sold, hidden"
            ))),
        }
    }
}

/// Entity types whose changes invalidate cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Car,
    Dealer,
}

impl EntityKind {
    /// URL collection segment, also the listing cache namespace.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Car => "cars",
            EntityKind::Dealer => "dealers",
        }
    }

    /// Kinds whose representations embed this kind.
    pub fn dependents(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Car => &[],
            EntityKind::Dealer => &[EntityKind::Car],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Car => "car",
            EntityKind::Dealer => "dealer",
        }
    }
}
