//! JSON representations served by the catalog.

use std::collections::HashMap;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PaginationMeta;
use crate::cache::ParamMap;
use crate::domain::entities::{CarRecord, DealerRecord};
use crate::domain::types::CarStatus;

/// Facet buckets are capped to the most frequent values.
pub const FACET_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealerView {
    pub id: Uuid,
    pub name: String,
    pub country_code: String,
    pub city: String,
}

impl From<&DealerRecord> for DealerView {
    fn from(dealer: &DealerRecord) -> Self {
        Self {
            id: dealer.id,
            name: dealer.name.clone(),
            country_code: dealer.country_code.clone(),
            city: dealer.city.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealerDetailView {
    #[serde(flatten)]
    pub dealer: DealerView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarView {
    pub id: Uuid,
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
    /// `null` only if the dealer vanished between reads.
    pub dealer: Option<DealerView>,
}

impl CarView {
    pub fn new(car: CarRecord, dealer: Option<&DealerRecord>) -> Self {
        Self {
            id: car.id,
            make: car.make,
            model: car.model,
            year: car.year,
            price_cents: car.price_cents,
            mileage_km: car.mileage_km,
            country_code: car.country_code,
            city: car.city,
            status: car.status,
            listed_at: car.listed_at,
            updated_at: car.updated_at,
            dealer: dealer.map(DealerView::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingMeta {
    pub pagination: PaginationMeta,
    pub filters_applied: ParamMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetBucket<T> {
    pub value: T,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facets {
    pub make: Vec<FacetBucket<String>>,
    pub year: Vec<FacetBucket<i32>>,
}

impl Facets {
    /// Counts over the whole filtered result set, not just the page.
    pub fn from_cars(cars: &[CarRecord]) -> Self {
        Self {
            make: top_buckets(cars.iter().map(|car| car.make.clone())),
            year: top_buckets(cars.iter().map(|car| car.year)),
        }
    }
}

fn top_buckets<T, I>(values: I) -> Vec<FacetBucket<T>>
where
    T: Ord + std::hash::Hash + Clone,
    I: Iterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut buckets: Vec<FacetBucket<T>> = counts
        .into_iter()
        .map(|(value, count)| FacetBucket { value, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    buckets.truncate(FACET_LIMIT);
    buckets
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingBody<T> {
    pub data: Vec<T>,
    pub meta: ListingMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Facets>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailBody<T> {
    pub data: T,
}

/// `{ "message": … }` body, with per-field `errors` on 422 replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<std::collections::BTreeMap<String, Vec<String>>>,
}

impl MessageBody {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: None,
        }
    }
}
