#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use showroom::{
    application::{
        catalog::CatalogSettings,
        repos::{InventoryRepo, InventoryWriteRepo},
    },
    cache::{CacheConfig, CacheStore, Clock, ManualClock, MemoryStore, StoreError},
    domain::{
        CarStatus,
        entities::{CarRecord, DealerRecord},
    },
    infra::{
        bootstrap::{self, ApplicationContext, Components},
        http::build_router,
        memory::MemoryInventory,
    },
};
use time::{OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const T0: OffsetDateTime = datetime!(2026-03-02 09:00 UTC);

pub struct TestApp {
    pub router: Router,
    pub context: ApplicationContext,
    pub clock: Arc<ManualClock>,
    pub inventory: Arc<MemoryInventory>,
    pub dealer: DealerRecord,
    pub toyota: CarRecord,
    pub honda: CarRecord,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(CacheConfig::default(), None).await
}

/// Builds the full router over a manual clock. `store` replaces the memory
/// store when given.
pub async fn spawn_app_with(
    cache_config: CacheConfig,
    store: Option<Arc<dyn CacheStore>>,
) -> TestApp {
    let clock = Arc::new(ManualClock::new(T0));
    let inventory = Arc::new(MemoryInventory::new());

    let dealer = dealer_record("Harbour Motors", "NL", "Rotterdam");
    inventory.seed_dealer(dealer.clone()).await;
    let toyota = car_record(&dealer, "Toyota", "Corolla", 2019, 1_450_000);
    let honda = car_record(&dealer, "Honda", "Civic", 2021, 1_990_000);
    inventory.seed_car(toyota.clone()).await;
    inventory.seed_car(honda.clone()).await;

    let store = store.unwrap_or_else(|| {
        Arc::new(MemoryStore::new(
            cache_config.store_capacity,
            clock.clone() as Arc<dyn Clock>,
        ))
    });
    let reader: Arc<dyn InventoryRepo> = inventory.clone();
    let writer: Arc<dyn InventoryWriteRepo> = inventory.clone();

    let context = bootstrap::assemble(Components {
        cache_config,
        catalog: CatalogSettings::default(),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        reader,
        writer,
        store,
        clock: clock.clone(),
    });
    let router = build_router(context.http.clone());

    TestApp {
        router,
        context,
        clock,
        inventory,
        dealer,
        toyota,
        honda,
    }
}

pub fn dealer_record(name: &str, country_code: &str, city: &str) -> DealerRecord {
    DealerRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        country_code: country_code.to_string(),
        city: city.to_string(),
        created_at: T0,
        updated_at: T0,
    }
}

pub fn car_record(
    dealer: &DealerRecord,
    make: &str,
    model: &str,
    year: i32,
    price_cents: i64,
) -> CarRecord {
    CarRecord {
        id: Uuid::new_v4(),
        dealer_id: dealer.id,
        make: make.to_string(),
        model: model.to_string(),
        year,
        price_cents,
        mileage_km: 42_000,
        country_code: dealer.country_code.clone(),
        city: dealer.city.clone(),
        status: CarStatus::Active,
        listed_at: T0,
        updated_at: T0,
    }
}

impl TestApp {
    pub fn advance(&self, seconds: u64) {
        self.clock.advance(Duration::from_secs(seconds));
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.get_with(uri, HeaderMap::new()).await
    }

    pub async fn get_with(&self, uri: &str, headers: HeaderMap) -> Response {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        self.send(request.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn get_if_none_match(&self, uri: &str, etag: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, etag.parse().expect("etag header"));
        self.get_with(uri, headers).await
    }

    /// Authenticated JSON write.
    pub async fn write(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.write_as(method, uri, body, Some(ADMIN_TOKEN)).await
    }

    pub async fn write_as(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(request.body(body).expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Waits for every scheduled background refresh to finish.
    pub async fn settle(&self) {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.context.cache.refresher().settle(),
        )
        .await
        .expect("refreshes settle");
    }
}

pub fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

pub fn x_cache(response: &Response) -> &str {
    header_str(response, "x-cache").unwrap_or("")
}

pub fn etag(response: &Response) -> String {
    header_str(response, "etag")
        .expect("etag header present")
        .to_string()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn expect_status(response: Response, status: StatusCode) -> Value {
    let actual = response.status();
    let bytes = body_bytes(response).await;
    assert_eq!(
        actual,
        status,
        "unexpected status; body: {}",
        String::from_utf8_lossy(&bytes)
    );
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

fn offline() -> StoreError {
    StoreError::Unavailable("store offline".to_string())
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
        Err(offline())
    }

    async fn put(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn put_if_absent(
        &self,
        _key: &str,
        _value: Bytes,
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        Err(offline())
    }

    async fn has(&self, _key: &str) -> Result<bool, StoreError> {
        Err(offline())
    }

    async fn forget(&self, _key: &str) -> Result<bool, StoreError> {
        Err(offline())
    }

    async fn forget_prefix(&self, _prefix: &str) -> Result<usize, StoreError> {
        Err(offline())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        Err(offline())
    }
}
