use crate::domain::booking::BookingSummary;
use crate::domain::cancel_token::CancelToken;
use chrono::{FixedOffset, Offset, Utc};
use std::fmt::Write;

/// Brasília time, used for every date shown to guests.
const BRT_OFFSET_SECONDS: i32 = -3 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    BookingConfirmation,
    RefundRequestConfirmation,
}

impl EmailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            EmailTemplate::BookingConfirmation => "booking_confirmation",
            EmailTemplate::RefundRequestConfirmation => "refund_request_confirmation",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::BookingConfirmation => "Confirmação de reserva",
            EmailTemplate::RefundRequestConfirmation => "Confirmação de solicitação de reembolso",
        }
    }
}

/// Values rendered into guest emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingEmail {
    pub booking_id: String,
    pub guest_name: String,
    pub guest_phone: String,
    pub guest_email: String,
    pub court_name: String,
    pub court_address: String,
    pub booking_date: String,
    pub booking_interval: String,
    pub total_price: String,
    pub verification_code: String,
    pub cancel_token: Option<CancelToken>,
}

impl BookingEmail {
    pub fn from_summary(summary: &BookingSummary, cancel_token: Option<CancelToken>) -> Self {
        let brt = FixedOffset::east_opt(BRT_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix());
        let start = summary.start_time.with_timezone(&brt);
        let end = summary.end_time.with_timezone(&brt);

        Self {
            booking_id: summary.booking_id.clone(),
            guest_name: summary.guest.name.clone(),
            guest_phone: summary.guest.phone.clone(),
            guest_email: summary.guest.email.clone(),
            court_name: summary.court_name.clone(),
            court_address: summary.company_address.clone(),
            booking_date: start.format("%d-%m-%Y").to_string(),
            booking_interval: format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
            total_price: summary.total_price.to_string(),
            verification_code: summary.verification_code.clone(),
            cancel_token,
        }
    }

    /// Plain-text body for `template`.
    pub fn render(&self, template: EmailTemplate) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "Olá, {}!", self.guest_name);
        let _ = writeln!(body);
        match template {
            EmailTemplate::BookingConfirmation => {
                let _ = writeln!(body, "Seu pagamento foi confirmado e sua reserva está garantida.");
            }
            EmailTemplate::RefundRequestConfirmation => {
                let _ = writeln!(body, "Recebemos sua solicitação de cancelamento e o reembolso foi solicitado.");
            }
        }
        let _ = writeln!(body);
        let _ = writeln!(body, "Reserva: {}", self.booking_id);
        let _ = writeln!(body, "Quadra: {}", self.court_name);
        let _ = writeln!(body, "Endereço: {}", self.court_address);
        let _ = writeln!(body, "Data: {}", self.booking_date);
        let _ = writeln!(body, "Horário: {}", self.booking_interval);
        let _ = writeln!(body, "Valor: R$ {}", self.total_price);
        let _ = writeln!(body, "Código de verificação: {}", self.verification_code);
        if let (EmailTemplate::BookingConfirmation, Some(token)) = (template, &self.cancel_token) {
            let _ = writeln!(body);
            let _ = writeln!(body, "Para cancelar, use o código de cancelamento abaixo:");
            let _ = writeln!(body, "{}", token.expose());
        }
        body
    }
}

/// One email waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJob {
    pub template: EmailTemplate,
    pub subject: String,
    pub data: BookingEmail,
    pub recipients: Vec<String>,
}

impl EmailJob {
    pub fn new(template: EmailTemplate, data: BookingEmail) -> Self {
        let recipients = vec![data.guest_email.clone()];
        Self {
            template,
            subject: template.subject().to_string(),
            data,
            recipients,
        }
    }
}
