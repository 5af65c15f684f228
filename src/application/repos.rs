//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CarRecord, DealerRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait InventoryRepo: Send + Sync {
    /// Every car, in no particular order.
    async fn list_cars(&self) -> Result<Vec<CarRecord>, RepoError>;

    async fn find_car(&self, id: Uuid) -> Result<Option<CarRecord>, RepoError>;

    async fn list_dealers(&self) -> Result<Vec<DealerRecord>, RepoError>;

    async fn find_dealer(&self, id: Uuid) -> Result<Option<DealerRecord>, RepoError>;

    async fn count_cars_for_dealer(&self, dealer_id: Uuid) -> Result<usize, RepoError>;
}

#[async_trait]
pub trait InventoryWriteRepo: Send + Sync {
    async fn insert_car(&self, car: CarRecord) -> Result<CarRecord, RepoError>;

    /// Replaces an existing car. `NotFound` when the id is unknown.
    async fn update_car(&self, car: CarRecord) -> Result<CarRecord, RepoError>;

    async fn delete_car(&self, id: Uuid) -> Result<CarRecord, RepoError>;

    async fn insert_dealer(&self, dealer: DealerRecord) -> Result<DealerRecord, RepoError>;

    async fn update_dealer(&self, dealer: DealerRecord) -> Result<DealerRecord, RepoError>;

    /// Fails with `Integrity` while cars still reference the dealer.
    async fn delete_dealer(&self, id: Uuid) -> Result<DealerRecord, RepoError>;
}
