//! HTTP surface: guest showcase, operator admin and gateway webhooks.

mod admin;
mod showcase;
pub mod signature;
mod webhooks;

use crate::application::booking::BookingService;
use crate::application::onboarding::CompanyOnboarding;
use crate::application::payment::PaymentService;
use crate::domain::ports::SharedCourtDirectory;
use crate::error::BookingError;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub onboarding: Arc<CompanyOnboarding>,
    pub courts: SharedCourtDirectory,
    /// HMAC key for webhook signatures; `None` trusts every payload.
    pub webhook_secret: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/showcase/courts/:court_id/bookings", post(showcase::create_booking))
        .route("/showcase/bookings/status", get(showcase::booking_status))
        .route("/showcase/bookings/cancel", post(showcase::cancel_booking))
        .route("/showcase/bookings/:booking_id/charge", get(showcase::charge_information))
        .route("/admin/companies", post(admin::register_company))
        .route("/admin/companies/:company_id/courts", post(admin::register_court))
        .route("/admin/companies/:company_id/bookings", get(admin::list_bookings))
        .route(
            "/admin/companies/:company_id/bookings/:booking_id/confirm",
            patch(admin::confirm_booking),
        )
        .route(
            "/admin/companies/:company_id/bookings/:booking_id/retry-charge",
            post(admin::retry_charge),
        )
        .route("/admin/companies/:company_id/balance", get(admin::balance))
        .route("/admin/companies/:company_id/withdraw", post(admin::withdraw))
        .route("/webhooks/pix/confirmed", post(webhooks::payment_confirmed))
        .route("/webhooks/pix/expired", post(webhooks::payment_expired))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Error half of every handler: maps the error taxonomy onto status codes.
pub struct ApiError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            BookingError::Persistence(_) | BookingError::Notification(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, retryable = self.0.is_retryable(), "request failed");
        }
        let body = json!({
            "status": "error",
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthFailure, ConflictKind, GatewayError};

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (BookingError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (BookingError::not_found("booking 1"), StatusCode::NOT_FOUND),
            (
                BookingError::Unauthorized(AuthFailure::TokenExpired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                BookingError::Conflict(ConflictKind::AlreadyConfirmed),
                StatusCode::CONFLICT,
            ),
            (
                BookingError::Gateway(GatewayError::Timeout),
                StatusCode::BAD_GATEWAY,
            ),
            (
                BookingError::Persistence("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
