//! Write routes. Each handler commits through the inventory service, which
//! invalidates the response cache before the reply is sent.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::application::catalog::DetailBody;
use crate::application::error::HttpError;
use crate::application::inventory::{
    CreateCarCommand, CreateDealerCommand, UpdateCarCommand, UpdateDealerCommand,
};

use super::HttpState;

const SOURCE: &str = "infra::http::inventory";

pub(super) async fn create_car(
    State(state): State<HttpState>,
    body: Result<Json<CreateCarCommand>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(command) = body.map_err(rejection_to_http)?;
    let car = state.inventory.create_car(command).await?;
    Ok(created(car))
}

pub(super) async fn update_car(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateCarCommand>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(command) = body.map_err(rejection_to_http)?;
    let car = state.inventory.update_car(id, command).await?;
    Ok(ok(car))
}

pub(super) async fn delete_car(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.inventory.delete_car(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn create_dealer(
    State(state): State<HttpState>,
    body: Result<Json<CreateDealerCommand>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(command) = body.map_err(rejection_to_http)?;
    let dealer = state.inventory.create_dealer(command).await?;
    Ok(created(dealer))
}

pub(super) async fn update_dealer(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateDealerCommand>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(command) = body.map_err(rejection_to_http)?;
    let dealer = state.inventory.update_dealer(id, command).await?;
    Ok(ok(dealer))
}

pub(super) async fn delete_dealer(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.inventory.delete_dealer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(DetailBody { data })).into_response()
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(DetailBody { data }).into_response()
}

fn rejection_to_http(rejection: JsonRejection) -> HttpError {
    let status = match &rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    HttpError::new(SOURCE, status, rejection.body_text(), rejection.to_string())
}
