//! In-memory inventory backing both repository traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{InventoryRepo, InventoryWriteRepo, RepoError};
use crate::domain::entities::{CarRecord, DealerRecord};
use crate::domain::types::CarStatus;

#[derive(Debug, Default)]
struct Tables {
    dealers: BTreeMap<Uuid, DealerRecord>,
    cars: BTreeMap<Uuid, CarRecord>,
}

/// Dealers and cars held in ordered maps behind one lock, so each write
/// commits atomically with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    tables: RwLock<Tables>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory pre-filled with a small demo catalogue listed before `now`.
    pub async fn with_demo_data(now: OffsetDateTime) -> Self {
        let inventory = Self::new();
        for dealer in demo_dealers(now) {
            inventory.seed_dealer(dealer).await;
        }
        let dealer_ids: Vec<Uuid> = inventory.tables.read().await.dealers.keys().copied().collect();
        for car in demo_cars(&dealer_ids, now) {
            inventory.seed_car(car).await;
        }
        inventory
    }

    /// Inserts without integrity checks.
    pub async fn seed_dealer(&self, dealer: DealerRecord) {
        self.tables.write().await.dealers.insert(dealer.id, dealer);
    }

    pub async fn seed_car(&self, car: CarRecord) {
        self.tables.write().await.cars.insert(car.id, car);
    }
}

#[async_trait]
impl InventoryRepo for MemoryInventory {
    async fn list_cars(&self) -> Result<Vec<CarRecord>, RepoError> {
        Ok(self.tables.read().await.cars.values().cloned().collect())
    }

    async fn find_car(&self, id: Uuid) -> Result<Option<CarRecord>, RepoError> {
        Ok(self.tables.read().await.cars.get(&id).cloned())
    }

    async fn list_dealers(&self) -> Result<Vec<DealerRecord>, RepoError> {
        Ok(self.tables.read().await.dealers.values().cloned().collect())
    }

    async fn find_dealer(&self, id: Uuid) -> Result<Option<DealerRecord>, RepoError> {
        Ok(self.tables.read().await.dealers.get(&id).cloned())
    }

    async fn count_cars_for_dealer(&self, dealer_id: Uuid) -> Result<usize, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .cars
            .values()
            .filter(|car| car.dealer_id == dealer_id)
            .count())
    }
}

#[async_trait]
impl InventoryWriteRepo for MemoryInventory {
    async fn insert_car(&self, car: CarRecord) -> Result<CarRecord, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.dealers.contains_key(&car.dealer_id) {
            return Err(RepoError::Integrity {
                message: format!("dealer `{}` does not exist", car.dealer_id),
            });
        }
        if tables.cars.contains_key(&car.id) {
            return Err(RepoError::Integrity {
                message: format!("car `{}` already exists", car.id),
            });
        }
        tables.cars.insert(car.id, car.clone());
        Ok(car)
    }

    async fn update_car(&self, car: CarRecord) -> Result<CarRecord, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.dealers.contains_key(&car.dealer_id) {
            return Err(RepoError::Integrity {
                message: format!("dealer `{}` does not exist", car.dealer_id),
            });
        }
        let slot = tables.cars.get_mut(&car.id).ok_or(RepoError::NotFound)?;
        *slot = car.clone();
        Ok(car)
    }

    async fn delete_car(&self, id: Uuid) -> Result<CarRecord, RepoError> {
        self.tables
            .write()
            .await
            .cars
            .remove(&id)
            .ok_or(RepoError::NotFound)
    }

    async fn insert_dealer(&self, dealer: DealerRecord) -> Result<DealerRecord, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.dealers.contains_key(&dealer.id) {
            return Err(RepoError::Integrity {
                message: format!("dealer `{}` already exists", dealer.id),
            });
        }
        tables.dealers.insert(dealer.id, dealer.clone());
        Ok(dealer)
    }

    async fn update_dealer(&self, dealer: DealerRecord) -> Result<DealerRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .dealers
            .get_mut(&dealer.id)
            .ok_or(RepoError::NotFound)?;
        *slot = dealer.clone();
        Ok(dealer)
    }

    async fn delete_dealer(&self, id: Uuid) -> Result<DealerRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let listed = tables.cars.values().filter(|car| car.dealer_id == id).count();
        if listed > 0 {
            return Err(RepoError::Integrity {
                message: format!("dealer `{id}` still has {listed} car(s)"),
            });
        }
        tables.dealers.remove(&id).ok_or(RepoError::NotFound)
    }
}

fn demo_dealers(now: OffsetDateTime) -> Vec<DealerRecord> {
    [
        ("Autohaus Nord", "DE", "Hamburg"),
        ("Garage du Lac", "FR", "Annecy"),
        ("Motori Milano", "IT", "Milan"),
    ]
    .into_iter()
    .map(|(name, country_code, city)| DealerRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        country_code: country_code.to_string(),
        city: city.to_string(),
        created_at: now - Duration::days(365),
        updated_at: now - Duration::days(365),
    })
    .collect()
}

fn demo_cars(dealer_ids: &[Uuid], now: OffsetDateTime) -> Vec<CarRecord> {
    const MODELS: [(&str, &str); 6] = [
        ("Toyota", "Corolla"),
        ("Toyota", "RAV4"),
        ("Volkswagen", "Golf"),
        ("Renault", "Clio"),
        ("Fiat", "500"),
        ("Honda", "Civic"),
    ];
    if dealer_ids.is_empty() {
        return Vec::new();
    }

    (0..24_i64)
        .map(|n| {
            let (make, model) = MODELS[(n as usize) % MODELS.len()];
            let dealer_id = dealer_ids[(n as usize) % dealer_ids.len()];
            let status = match n % 8 {
                6 => CarStatus::Sold,
                7 => CarStatus::Hidden,
                _ => CarStatus::Active,
            };
            let listed_at = now - Duration::hours(6 * (n + 1));
            CarRecord {
                id: Uuid::new_v4(),
                dealer_id,
                make: make.to_string(),
                model: model.to_string(),
                year: 2014 + (n % 11) as i32,
                price_cents: 800_000 + n * 125_000,
                mileage_km: 5_000 + n * 7_500,
                country_code: ["DE", "FR", "IT"][(n as usize) % 3].to_string(),
                city: ["Hamburg", "Annecy", "Milan"][(n as usize) % 3].to_string(),
                status,
                listed_at,
                updated_at: listed_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

    fn dealer() -> DealerRecord {
        DealerRecord {
            id: Uuid::new_v4(),
            name: "Autohaus Süd".to_string(),
            country_code: "DE".to_string(),
            city: "Munich".to_string(),
            created_at: NOW,
            updated_at: NOW,
        }
    }

    fn car(dealer_id: Uuid) -> CarRecord {
        CarRecord {
            id: Uuid::new_v4(),
            dealer_id,
            make: "BMW".to_string(),
            model: "320d".to_string(),
            year: 2019,
            price_cents: 2_100_000,
            mileage_km: 80_000,
            country_code: "DE".to_string(),
            city: "Munich".to_string(),
            status: CarStatus::Active,
            listed_at: NOW,
            updated_at: NOW,
        }
    }

    #[tokio::test]
    async fn car_requires_existing_dealer() {
        let inventory = MemoryInventory::new();
        let err = inventory.insert_car(car(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));
    }

    #[tokio::test]
    async fn dealer_delete_refused_while_cars_remain() {
        let inventory = MemoryInventory::new();
        let dealer = inventory.insert_dealer(dealer()).await.unwrap();
        let car = inventory.insert_car(car(dealer.id)).await.unwrap();
        assert_eq!(inventory.count_cars_for_dealer(dealer.id).await.unwrap(), 1);

        let err = inventory.delete_dealer(dealer.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));

        inventory.delete_car(car.id).await.unwrap();
        inventory.delete_dealer(dealer.id).await.unwrap();
        assert!(inventory.find_dealer(dealer.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_unknown_car_is_not_found() {
        let inventory = MemoryInventory::new();
        let dealer = inventory.insert_dealer(dealer()).await.unwrap();
        let err = inventory.update_car(car(dealer.id)).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn demo_data_is_valid() {
        let inventory = MemoryInventory::with_demo_data(NOW).await;
        let dealers = inventory.list_dealers().await.unwrap();
        let cars = inventory.list_cars().await.unwrap();
        assert_eq!(dealers.len(), 3);
        assert_eq!(cars.len(), 24);
        for car in &cars {
            car.validate(NOW).expect("demo car is valid");
            assert!(dealers.iter().any(|dealer| dealer.id == car.dealer_id));
        }
        for dealer in &dealers {
            dealer.validate().expect("demo dealer is valid");
        }
    }
}
