//! Read side of the inventory, exposed to the response cache as a
//! [`ResponseSource`].
//!
//! Namespaces map onto resources:
//!
//! | namespace       | resource             |
//! |-----------------|----------------------|
//! | `cars`          | active car listing   |
//! | `cars/{id}`     | car with its dealer  |
//! | `dealers`       | dealer listing       |
//! | `dealers/{id}`  | dealer detail        |

pub mod query;
pub mod views;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::paginate;
use crate::application::repos::{InventoryRepo, RepoError};
use crate::cache::{CacheRequest, ParamMap, ResponseSource, SourceError, SourceResponse};
use crate::domain::entities::DealerRecord;
use crate::domain::types::EntityKind;

pub use query::{CarFilter, CarQuery, DealerQuery, SortField, SortOrder, ValidationErrors};
pub use views::{
    CarView, DealerDetailView, DealerView, DetailBody, FacetBucket, Facets, ListingBody,
    ListingMeta, MessageBody,
};

/// Listing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSettings {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 50,
        }
    }
}

impl From<&crate::config::CatalogSettings> for CatalogSettings {
    fn from(settings: &crate::config::CatalogSettings) -> Self {
        Self {
            default_per_page: settings.default_per_page,
            max_per_page: settings.max_per_page,
        }
    }
}

/// Resource addressed by a cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Listing(EntityKind),
    Detail(EntityKind, Option<Uuid>),
    Unknown,
}

impl Resource {
    fn parse(namespace: &str) -> Self {
        let (collection, id) = match namespace.split_once('/') {
            Some((collection, id)) => (collection, Some(id)),
            None => (namespace, None),
        };
        let kind = match collection {
            "cars" => EntityKind::Car,
            "dealers" => EntityKind::Dealer,
            _ => return Self::Unknown,
        };
        match id {
            None => Self::Listing(kind),
            Some(raw) => Self::Detail(kind, Uuid::parse_str(raw).ok()),
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn InventoryRepo>,
    settings: CatalogSettings,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn InventoryRepo>, settings: CatalogSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    async fn list_cars(&self, params: &ParamMap) -> Result<SourceResponse, SourceError> {
        let query = match CarQuery::from_params(params, &self.settings) {
            Ok(query) => query,
            Err(errors) => return unprocessable(errors),
        };

        let cars = self.repo.list_cars().await.map_err(repo_unavailable)?;
        let selected = query.select(cars);
        let facets = query.include_facets.then(|| Facets::from_cars(&selected));
        let page = paginate(selected, query.page);

        let dealers = self.dealer_index().await?;
        let data: Vec<CarView> = page
            .items
            .into_iter()
            .map(|car| {
                let dealer = dealers.get(&car.dealer_id);
                CarView::new(car, dealer)
            })
            .collect();

        let body = ListingBody {
            data,
            meta: ListingMeta {
                pagination: page.meta,
                filters_applied: query.filters_applied,
            },
            facets,
        };
        SourceResponse::json(StatusCode::OK, &body)
    }

    async fn show_car(&self, id: Option<Uuid>) -> Result<SourceResponse, SourceError> {
        let Some(id) = id else {
            return not_found(EntityKind::Car);
        };
        let Some(car) = self.repo.find_car(id).await.map_err(repo_unavailable)? else {
            return not_found(EntityKind::Car);
        };
        let dealer = self
            .repo
            .find_dealer(car.dealer_id)
            .await
            .map_err(repo_unavailable)?;
        let body = DetailBody {
            data: CarView::new(car, dealer.as_ref()),
        };
        SourceResponse::json(StatusCode::OK, &body)
    }

    async fn list_dealers(&self, params: &ParamMap) -> Result<SourceResponse, SourceError> {
        let query = match DealerQuery::from_params(params, &self.settings) {
            Ok(query) => query,
            Err(errors) => return unprocessable(errors),
        };

        let mut dealers = self.repo.list_dealers().await.map_err(repo_unavailable)?;
        if let Some(code) = query.country_code.as_deref() {
            dealers.retain(|dealer| dealer.country_code == code);
        }
        dealers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let page = paginate(dealers, query.page);
        let body = ListingBody {
            data: page.items.iter().map(DealerView::from).collect::<Vec<_>>(),
            meta: ListingMeta {
                pagination: page.meta,
                filters_applied: query.filters_applied,
            },
            facets: None,
        };
        SourceResponse::json(StatusCode::OK, &body)
    }

    async fn show_dealer(&self, id: Option<Uuid>) -> Result<SourceResponse, SourceError> {
        let Some(id) = id else {
            return not_found(EntityKind::Dealer);
        };
        let Some(dealer) = self.repo.find_dealer(id).await.map_err(repo_unavailable)? else {
            return not_found(EntityKind::Dealer);
        };
        let body = DetailBody {
            data: DealerDetailView {
                dealer: DealerView::from(&dealer),
                created_at: dealer.created_at,
                updated_at: dealer.updated_at,
            },
        };
        SourceResponse::json(StatusCode::OK, &body)
    }

    async fn dealer_index(&self) -> Result<HashMap<Uuid, DealerRecord>, SourceError> {
        let dealers = self.repo.list_dealers().await.map_err(repo_unavailable)?;
        Ok(dealers.into_iter().map(|dealer| (dealer.id, dealer)).collect())
    }
}

#[async_trait]
impl ResponseSource for CatalogService {
    async fn compute(&self, request: &CacheRequest) -> Result<SourceResponse, SourceError> {
        let resource = Resource::parse(&request.namespace);
        debug!(namespace = %request.namespace, ?resource, "Computing catalog response");
        match resource {
            Resource::Listing(EntityKind::Car) => self.list_cars(&request.params).await,
            Resource::Listing(EntityKind::Dealer) => self.list_dealers(&request.params).await,
            Resource::Detail(EntityKind::Car, id) => self.show_car(id).await,
            Resource::Detail(EntityKind::Dealer, id) => self.show_dealer(id).await,
            Resource::Unknown => SourceResponse::json(
                StatusCode::NOT_FOUND,
                &MessageBody::message("Resource not found."),
            ),
        }
    }
}

fn not_found(kind: EntityKind) -> Result<SourceResponse, SourceError> {
    let message = match kind {
        EntityKind::Car => "Car not found.",
        EntityKind::Dealer => "Dealer not found.",
    };
    SourceResponse::json(StatusCode::NOT_FOUND, &MessageBody::message(message))
}

fn unprocessable(errors: ValidationErrors) -> Result<SourceResponse, SourceError> {
    let message = errors
        .values()
        .flatten()
        .next()
        .cloned()
        .unwrap_or_else(|| "The given data was invalid.".to_string());
    SourceResponse::json(
        StatusCode::UNPROCESSABLE_ENTITY,
        &MessageBody {
            message,
            errors: Some(errors),
        },
    )
}

fn repo_unavailable(err: RepoError) -> SourceError {
    SourceError::unavailable(err)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use time::macros::datetime;

    use super::*;
    use crate::cache::normalize_params;
    use crate::domain::entities::CarRecord;
    use crate::domain::types::CarStatus;
    use crate::infra::memory::MemoryInventory;

    fn dealer(name: &str) -> DealerRecord {
        DealerRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            country_code: "DE".to_string(),
            city: "Berlin".to_string(),
            created_at: datetime!(2025-01-01 00:00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00:00 UTC),
        }
    }

    fn car(dealer_id: Uuid, make: &str, year: i32, status: CarStatus) -> CarRecord {
        CarRecord {
            id: Uuid::new_v4(),
            dealer_id,
            make: make.to_string(),
            model: "Base".to_string(),
            year,
            price_cents: 1_500_000,
            mileage_km: 42_000,
            country_code: "DE".to_string(),
            city: "Berlin".to_string(),
            status,
            listed_at: datetime!(2025-02-01 00:00:00 UTC),
            updated_at: datetime!(2025-02-01 00:00:00 UTC),
        }
    }

    async fn fixture() -> (CatalogService, DealerRecord, Vec<CarRecord>) {
        let inventory = Arc::new(MemoryInventory::new());
        let dealer = dealer("Autohaus Nord");
        inventory.seed_dealer(dealer.clone()).await;
        let cars = vec![
            car(dealer.id, "Toyota", 2020, CarStatus::Active),
            car(dealer.id, "Toyota", 2021, CarStatus::Active),
            car(dealer.id, "Honda", 2021, CarStatus::Active),
            car(dealer.id, "Honda", 2019, CarStatus::Sold),
        ];
        for car in &cars {
            inventory.seed_car(car.clone()).await;
        }
        (
            CatalogService::new(inventory, CatalogSettings::default()),
            dealer,
            cars,
        )
    }

    async fn compute(
        service: &CatalogService,
        namespace: &str,
        pairs: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let request = CacheRequest::new(namespace, normalize_params(pairs.iter().copied()));
        let response = service.compute(&request).await.expect("compute");
        let body = serde_json::from_slice(&response.content).expect("json body");
        (response.status, body)
    }

    #[tokio::test]
    async fn listing_embeds_dealer_and_pagination() {
        let (service, dealer, _) = fixture().await;
        let (status, body) = compute(&service, "cars", &[("make", "toyota")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["pagination"]["total"], 2);
        assert_eq!(body["meta"]["filters_applied"]["make"], "toyota");
        assert_eq!(body["data"][0]["dealer"]["name"], dealer.name);
        assert!(body.get("facets").is_none());
    }

    #[tokio::test]
    async fn facets_cover_filtered_set() {
        let (service, _, _) = fixture().await;
        let (_, body) = compute(&service, "cars", &[("include_facets", "1"), ("per_page", "1")]).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["facets"]["make"][0]["value"], "Toyota");
        assert_eq!(body["facets"]["make"][0]["count"], 2);
        assert_eq!(body["facets"]["make"][1]["value"], "Honda");
        assert_eq!(body["facets"]["year"][0]["value"], 2021);
        assert_eq!(body["facets"]["year"][0]["count"], 2);
    }

    #[tokio::test]
    async fn invalid_listing_params_are_unprocessable() {
        let (service, _, _) = fixture().await;
        let (status, body) =
            compute(&service, "cars", &[("year_min", "2022"), ("year_max", "2020")]).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["year_max"].is_array());
    }

    #[tokio::test]
    async fn detail_returns_car_or_not_found() {
        let (service, dealer, cars) = fixture().await;
        let namespace = format!("cars/{}", cars[0].id);
        let (status, body) = compute(&service, &namespace, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], cars[0].id.to_string());
        assert_eq!(body["data"]["dealer"]["id"], dealer.id.to_string());

        let (status, _) = compute(&service, &format!("cars/{}", Uuid::new_v4()), &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = compute(&service, "cars/not-a-uuid", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dealer_detail_and_listing() {
        let (service, dealer, _) = fixture().await;
        let (status, body) = compute(&service, &format!("dealers/{}", dealer.id), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], dealer.name);

        let (status, body) = compute(&service, "dealers", &[("country_code", "FR")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn unknown_namespace_is_not_found() {
        let (service, _, _) = fixture().await;
        let (status, _) = compute(&service, "leads", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
