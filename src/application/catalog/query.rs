//! Car listing query: parameter validation, filtering and ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::cache::ParamMap;
use crate::domain::entities::CarRecord;
use crate::domain::types::CarStatus;

use super::CatalogSettings;
use crate::application::pagination::PageRequest;

/// Parameters that shape the response but are not filters.
const PRESENTATION_PARAMS: [&str; 4] = ["per_page", "page", "sort", "include_facets"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    ListedAt,
    PriceCents,
    MileageKm,
    Year,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "listed_at" => Some(Self::ListedAt),
            "price_cents" => Some(Self::PriceCents),
            "mileage_km" => Some(Self::MileageKm),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    fn compare(self, a: &CarRecord, b: &CarRecord) -> Ordering {
        match self {
            Self::ListedAt => a.listed_at.cmp(&b.listed_at),
            Self::PriceCents => a.price_cents.cmp(&b.price_cents),
            Self::MileageKm => a.mileage_km.cmp(&b.mileage_km),
            Self::Year => a.year.cmp(&b.year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortOrder {
    /// Newest listings first.
    fn default() -> Self {
        Self {
            field: SortField::ListedAt,
            descending: true,
        }
    }
}

/// Field name to messages, rendered as the 422 `errors` object.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarFilter {
    pub make: Option<String>,
    pub model: Option<String>,
    pub country_code: Option<String>,
    pub status: Option<CarStatus>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min_cents: Option<i64>,
    pub price_max_cents: Option<i64>,
    pub mileage_max_km: Option<i64>,
}

impl CarFilter {
    pub fn matches(&self, car: &CarRecord) -> bool {
        let status = self.status.unwrap_or(CarStatus::Active);
        car.status == status
            && self
                .make
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&car.make, needle))
            && self
                .model
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&car.model, needle))
            && self
                .country_code
                .as_deref()
                .is_none_or(|code| car.country_code == code)
            && self.year_min.is_none_or(|min| car.year >= min)
            && self.year_max.is_none_or(|max| car.year <= max)
            && self.price_min_cents.is_none_or(|min| car.price_cents >= min)
            && self.price_max_cents.is_none_or(|max| car.price_cents <= max)
            && self.mileage_max_km.is_none_or(|max| car.mileage_km <= max)
    }
}

/// Validated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct CarQuery {
    pub filter: CarFilter,
    pub sort: SortOrder,
    pub page: PageRequest,
    pub include_facets: bool,
    /// Filter parameters echoed back under `meta.filters_applied`.
    pub filters_applied: ParamMap,
}

impl CarQuery {
    pub fn from_params(
        params: &ParamMap,
        settings: &CatalogSettings,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut filter = CarFilter {
            make: params.get("make").cloned(),
            model: params.get("model").cloned(),
            country_code: params.get("country_code").cloned(),
            ..Default::default()
        };

        if let Some(raw) = params.get("status") {
            match raw.parse::<CarStatus>() {
                Ok(status) => filter.status = Some(status),
                Err(_) => push(&mut errors, "status", "The selected status is invalid."),
            }
        }

        filter.year_min = parse_year(params, "year_min", &mut errors);
        filter.year_max = parse_year(params, "year_max", &mut errors);
        if let (Some(min), Some(max)) = (filter.year_min, filter.year_max)
            && max < min
        {
            push(&mut errors, "year_max", "The year max must be greater than or equal to year min.");
        }

        filter.price_min_cents = parse_non_negative(params, "price_min_cents", &mut errors);
        filter.price_max_cents = parse_non_negative(params, "price_max_cents", &mut errors);
        if let (Some(min), Some(max)) = (filter.price_min_cents, filter.price_max_cents)
            && max < min
        {
            push(
                &mut errors,
                "price_max_cents",
                "The price max cents must be greater than or equal to price min cents.",
            );
        }

        filter.mileage_max_km = parse_non_negative(params, "mileage_max_km", &mut errors);

        let sort = match params.get("sort") {
            None => SortOrder::default(),
            Some(raw) => {
                let (descending, name) = match raw.strip_prefix('-') {
                    Some(name) => (true, name),
                    None => (false, raw.as_str()),
                };
                match SortField::parse(name) {
                    Some(field) => SortOrder { field, descending },
                    None => {
                        push(&mut errors, "sort", "The selected sort is invalid.");
                        SortOrder::default()
                    }
                }
            }
        };

        let page = parse_page_request(params, settings, &mut errors);

        let include_facets = match params.get("include_facets").map(String::as_str) {
            None | Some("0" | "false") => false,
            Some("1" | "true") => true,
            Some(_) => {
                push(
                    &mut errors,
                    "include_facets",
                    "The include facets field must be true or false.",
                );
                false
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let filters_applied = params
            .iter()
            .filter(|(name, _)| !PRESENTATION_PARAMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            filter,
            sort,
            page,
            include_facets,
            filters_applied,
        })
    }

    /// Applies the filter and ordering to `cars`.
    pub fn select(&self, cars: Vec<CarRecord>) -> Vec<CarRecord> {
        let mut selected: Vec<CarRecord> = cars
            .into_iter()
            .filter(|car| self.filter.matches(car))
            .collect();
        let SortOrder { field, descending } = self.sort;
        selected.sort_by(|a, b| {
            let primary = field.compare(a, b);
            let primary = if descending { primary.reverse() } else { primary };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        selected
    }
}

/// `per_page` and `page`, shared by every listing.
pub(super) fn parse_page_request(
    params: &ParamMap,
    settings: &CatalogSettings,
    errors: &mut ValidationErrors,
) -> PageRequest {
    let per_page = match params.get("per_page") {
        None => settings.default_per_page,
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if (1..=settings.max_per_page).contains(&value) => value,
            _ => {
                push(
                    errors,
                    "per_page",
                    &format!(
                        "The per page field must be an integer between 1 and {}.",
                        settings.max_per_page
                    ),
                );
                settings.default_per_page
            }
        },
    };

    let page = match params.get("page") {
        None => 1,
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value >= 1 => value,
            _ => {
                push(errors, "page", "The page field must be at least 1.");
                1
            }
        },
    };

    PageRequest::new(page, per_page)
}

/// Dealer listing request: optional exact country filter plus pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct DealerQuery {
    pub country_code: Option<String>,
    pub page: PageRequest,
    pub filters_applied: ParamMap,
}

impl DealerQuery {
    pub fn from_params(
        params: &ParamMap,
        settings: &CatalogSettings,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let page = parse_page_request(params, settings, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        let country_code = params.get("country_code").cloned();
        let filters_applied = country_code
            .iter()
            .map(|code| ("country_code".to_string(), code.clone()))
            .collect();
        Ok(Self {
            country_code,
            page,
            filters_applied,
        })
    }
}

fn push(errors: &mut ValidationErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn parse_year(params: &ParamMap, field: &str, errors: &mut ValidationErrors) -> Option<i32> {
    let raw = params.get(field)?;
    match raw.parse::<i32>() {
        Ok(year) if raw.len() == 4 && year >= 1000 => Some(year),
        _ => {
            push(errors, field, &format!("The {} field must be a four-digit year.", field.replace('_', " ")));
            None
        }
    }
}

fn parse_non_negative(params: &ParamMap, field: &str, errors: &mut ValidationErrors) -> Option<i64> {
    let raw = params.get(field)?;
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => Some(value),
        _ => {
            push(
                errors,
                field,
                &format!("The {} field must be a non-negative integer.", field.replace('_', " ")),
            );
            None
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
