use super::signature::verify_signature;
use super::{ApiResult, AppState};
use crate::domain::payment::{ChargeEvent, ChargeEventKind, Transition};
use crate::error::BookingError;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};
use tracing::{info, warn};

fn parse_event(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    kind: ChargeEventKind,
) -> ApiResult<ChargeEvent> {
    if let Some(secret) = &state.webhook_secret {
        verify_signature(body, headers, secret)?;
    }
    let event: ChargeEvent = serde_json::from_slice(body)
        .map_err(|e| BookingError::Validation(format!("malformed webhook payload: {e}")))?;
    if !event.is_kind(kind) {
        warn!(
            event = %event.event,
            status = %event.charge.status,
            expected = kind.event_name(),
            "webhook delivered to the wrong endpoint"
        );
        return Err(BookingError::Validation(format!(
            "expected {} event, got {:?} with charge status {:?}",
            kind.event_name(),
            event.event,
            event.charge.status
        ))
        .into());
    }
    info!(event = %event.event, correlation_id = %event.charge.correlation_id, "webhook received");
    Ok(event)
}

fn acknowledge(transition: Transition) -> Json<Value> {
    Json(json!({
        "status": "success",
        "applied": transition == Transition::Applied,
    }))
}

pub(super) async fn payment_confirmed(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let event = parse_event(&state, &headers, &body, ChargeEventKind::Completed)?;
    let transition = state.payments.confirm_payment(&event).await?;
    Ok(acknowledge(transition))
}

pub(super) async fn payment_expired(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let event = parse_event(&state, &headers, &body, ChargeEventKind::Expired)?;
    let transition = state.payments.expire_payment(&event).await?;
    Ok(acknowledge(transition))
}
