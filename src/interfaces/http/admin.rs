use super::{ApiResult, AppState};
use crate::domain::booking::{BookingFilter, Company, Court, PixKeyType};
use crate::domain::payment::ChargeInformation;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterCompanyRequest {
    name: String,
    address: String,
    email: String,
    phone: String,
    pix_key: String,
    pix_key_type: PixKeyType,
}

pub(super) async fn register_company(
    State(state): State<AppState>,
    Json(request): Json<RegisterCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    let company = state
        .onboarding
        .register(Company {
            id: String::new(),
            name: request.name,
            address: request.address,
            email: request.email,
            phone: request.phone,
            pix_key: request.pix_key,
            pix_key_type: request.pix_key_type,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterCourtRequest {
    name: String,
    hourly_price: Decimal,
}

pub(super) async fn register_court(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Json(request): Json<RegisterCourtRequest>,
) -> ApiResult<(StatusCode, Json<Court>)> {
    let court = state
        .courts
        .register_court(Court {
            id: String::new(),
            company_id,
            name: request.name,
            hourly_price: request.hourly_price,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(court)))
}

pub(super) async fn list_bookings(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Value>> {
    let bookings = state.bookings.list_by_company(&company_id, filter).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfirmRequest {
    verification_code: String,
}

pub(super) async fn confirm_booking(
    State(state): State<AppState>,
    Path((company_id, booking_id)): Path<(String, String)>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Json<Value>> {
    state
        .bookings
        .confirm_booking(&company_id, &booking_id, &request.verification_code)
        .await?;
    Ok(Json(json!({ "status": "confirmed" })))
}

pub(super) async fn retry_charge(
    State(state): State<AppState>,
    Path((company_id, booking_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let payment = state.bookings.retry_charge(&company_id, &booking_id).await?;
    Ok(Json(json!({ "charge": ChargeInformation::from(&payment) })))
}

pub(super) async fn balance(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let balance = state.payments.get_company_balance(&company_id).await?;
    Ok(Json(json!({ "balance": balance })))
}

pub(super) async fn withdraw(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let withdrawal = state.payments.create_withdraw_request(&company_id).await?;
    Ok(Json(json!({ "withdrawal": withdrawal })))
}
