use super::{ApiResult, AppState};
use crate::domain::booking::{Guest, NewBooking};
use crate::domain::cancel_token::CancelToken;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateBookingRequest {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    guest_name: String,
    guest_phone: String,
    guest_email: String,
}

pub(super) async fn create_booking(
    State(state): State<AppState>,
    Path(court_id): Path<String>,
    Json(request): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let id = state
        .bookings
        .create_booking(NewBooking {
            court_id,
            start_time: request.start_time,
            end_time: request.end_time,
            guest: Guest {
                name: request.guest_name,
                phone: request.guest_phone,
                email: request.guest_email,
            },
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusQuery {
    id: String,
}

pub(super) async fn booking_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let status = state
        .payments
        .get_booking_payment_status_by_id(&query.id)
        .await?;
    Ok(Json(json!({ "status": status })))
}

pub(super) async fn charge_information(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let charge = state
        .payments
        .get_booking_charge_information(&booking_id)
        .await?;
    Ok(Json(json!({ "charge": charge })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CancelRequest {
    booking_id: String,
    cancel_token: String,
}

pub(super) async fn cancel_booking(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> ApiResult<Json<Value>> {
    let token = CancelToken::from_guest(request.cancel_token);
    state
        .bookings
        .cancel_booking(&request.booking_id, &token)
        .await?;
    Ok(Json(json!({ "status": "cancelled" })))
}
