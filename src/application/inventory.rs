//! Write side of the inventory.
//!
//! Every committed mutation fires the cache trigger exactly once before the
//! call returns, so a read issued after the response observes the write.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::application::repos::{InventoryRepo, InventoryWriteRepo, RepoError};
use crate::cache::{CacheTrigger, ChangeKind, Clock};
use crate::domain::EntityKind;
use crate::domain::entities::{CarRecord, DealerRecord};
use crate::domain::error::DomainError;
use crate::domain::types::CarStatus;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for InventoryError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Integrity { message } => Self::Domain(DomainError::conflict(message)),
            other => Self::Repo(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDealerCommand {
    pub name: String,
    pub country_code: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDealerCommand {
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCarCommand {
    pub dealer_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_cents: i64,
    pub mileage_km: i64,
    pub country_code: String,
    pub city: String,
    #[serde(default = "default_status")]
    pub status: CarStatus,
}

fn default_status() -> CarStatus {
    CarStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCarCommand {
    pub dealer_id: Option<Uuid>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price_cents: Option<i64>,
    pub mileage_km: Option<i64>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub status: Option<CarStatus>,
}

#[derive(Clone)]
pub struct InventoryService {
    reader: Arc<dyn InventoryRepo>,
    writer: Arc<dyn InventoryWriteRepo>,
    clock: Arc<dyn Clock>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl InventoryService {
    pub fn new(
        reader: Arc<dyn InventoryRepo>,
        writer: Arc<dyn InventoryWriteRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            writer,
            clock,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger(mut self, trigger: Arc<CacheTrigger>) -> Self {
        self.cache_trigger = Some(trigger);
        self
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn create_dealer(
        &self,
        command: CreateDealerCommand,
    ) -> Result<DealerRecord, InventoryError> {
        let now = self.clock.now();
        let dealer = DealerRecord {
            id: Uuid::new_v4(),
            name: command.name.trim().to_string(),
            country_code: command.country_code,
            city: command.city.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        dealer.validate()?;

        let dealer = self.writer.insert_dealer(dealer).await?;
        self.invalidate(EntityKind::Dealer, dealer.id, ChangeKind::Created)
            .await;
        Ok(dealer)
    }

    pub async fn update_dealer(
        &self,
        id: Uuid,
        command: UpdateDealerCommand,
    ) -> Result<DealerRecord, InventoryError> {
        let mut dealer = self
            .reader
            .find_dealer(id)
            .await?
            .ok_or_else(|| DomainError::not_found("dealer", id))?;

        if let Some(name) = command.name {
            dealer.name = name.trim().to_string();
        }
        if let Some(country_code) = command.country_code {
            dealer.country_code = country_code;
        }
        if let Some(city) = command.city {
            dealer.city = city.trim().to_string();
        }
        dealer.updated_at = self.clock.now();
        dealer.validate()?;

        let dealer = self
            .writer
            .update_dealer(dealer)
            .await
            .map_err(|err| not_found_as(err, "dealer", id))?;
        self.invalidate(EntityKind::Dealer, dealer.id, ChangeKind::Updated)
            .await;
        Ok(dealer)
    }

    pub async fn delete_dealer(&self, id: Uuid) -> Result<DealerRecord, InventoryError> {
        let listed = self.reader.count_cars_for_dealer(id).await?;
        if listed > 0 {
            return Err(DomainError::conflict(format!(
                "dealer still has {listed} car(s) listed"
            ))
            .into());
        }

        let dealer = self
            .writer
            .delete_dealer(id)
            .await
            .map_err(|err| not_found_as(err, "dealer", id))?;
        self.invalidate(EntityKind::Dealer, dealer.id, ChangeKind::Deleted)
            .await;
        Ok(dealer)
    }

    pub async fn create_car(&self, command: CreateCarCommand) -> Result<CarRecord, InventoryError> {
        self.ensure_dealer(command.dealer_id).await?;

        let now = self.clock.now();
        let car = CarRecord {
            id: Uuid::new_v4(),
            dealer_id: command.dealer_id,
            make: command.make.trim().to_string(),
            model: command.model.trim().to_string(),
            year: command.year,
            price_cents: command.price_cents,
            mileage_km: command.mileage_km,
            country_code: command.country_code,
            city: command.city.trim().to_string(),
            status: command.status,
            listed_at: now,
            updated_at: now,
        };
        car.validate(now)?;

        let car = self.writer.insert_car(car).await?;
        self.invalidate(EntityKind::Car, car.id, ChangeKind::Created)
            .await;
        Ok(car)
    }

    pub async fn update_car(
        &self,
        id: Uuid,
        command: UpdateCarCommand,
    ) -> Result<CarRecord, InventoryError> {
        let mut car = self
            .reader
            .find_car(id)
            .await?
            .ok_or_else(|| DomainError::not_found("car", id))?;

        if let Some(dealer_id) = command.dealer_id {
            self.ensure_dealer(dealer_id).await?;
            car.dealer_id = dealer_id;
        }
        if let Some(make) = command.make {
            car.make = make.trim().to_string();
        }
        if let Some(model) = command.model {
            car.model = model.trim().to_string();
        }
        if let Some(year) = command.year {
            car.year = year;
        }
        if let Some(price_cents) = command.price_cents {
            car.price_cents = price_cents;
        }
        if let Some(mileage_km) = command.mileage_km {
            car.mileage_km = mileage_km;
        }
        if let Some(country_code) = command.country_code {
            car.country_code = country_code;
        }
        if let Some(city) = command.city {
            car.city = city.trim().to_string();
        }
        if let Some(status) = command.status {
            car.status = status;
        }

        let now = self.clock.now();
        car.updated_at = now;
        car.validate(now)?;

        let car = self
            .writer
            .update_car(car)
            .await
            .map_err(|err| not_found_as(err, "car", id))?;
        self.invalidate(EntityKind::Car, car.id, ChangeKind::Updated)
            .await;
        Ok(car)
    }

    pub async fn delete_car(&self, id: Uuid) -> Result<CarRecord, InventoryError> {
        let car = self
            .writer
            .delete_car(id)
            .await
            .map_err(|err| not_found_as(err, "car", id))?;
        self.invalidate(EntityKind::Car, car.id, ChangeKind::Deleted)
            .await;
        Ok(car)
    }

    async fn ensure_dealer(&self, id: Uuid) -> Result<(), InventoryError> {
        match self.reader.find_dealer(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::validation(format!("dealer `{id}` does not exist")).into()),
        }
    }

    /// The write is committed; an invalidation failure is logged, not returned.
    async fn invalidate(&self, entity: EntityKind, id: Uuid, change: ChangeKind) {
        let Some(trigger) = &self.cache_trigger else {
            return;
        };
        if let Err(err) = trigger.on_entity_changed(entity, id, change).await {
            error!(
                entity = entity.as_str(),
                entity_id = %id,
                change = change.as_str(),
                error = %err,
                "Cache invalidation failed after commit"
            );
        }
    }
}

fn not_found_as(err: RepoError, entity: &'static str, id: Uuid) -> InventoryError {
    match err {
        RepoError::NotFound => DomainError::not_found(entity, id).into(),
        other => other.into(),
    }
}
