use crate::config::OpenPixConfig;
use crate::domain::correlation::{ChargeCorrelationId, RefundCorrelationId};
use crate::domain::money::Cents;
use crate::domain::payment::{Charge, ChargeRequest, Refund, Withdrawal};
use crate::domain::ports::PaymentGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SPLIT_SUB_ACCOUNT: &str = "SPLIT_SUB_ACCOUNT";

type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubaccountRequest<'a> {
    name: &'a str,
    pix_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubaccountEnvelope {
    #[serde(rename = "SubAccount")]
    subaccount: SubaccountBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubaccountBody {
    pix_key: String,
    #[serde(default)]
    balance: i64,
}

#[derive(Debug, Serialize)]
struct Customer<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SplitLine<'a> {
    value: i64,
    pix_key: &'a str,
    split_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChargeRequest<'a> {
    #[serde(rename = "correlationID")]
    correlation_id: &'a str,
    value: i64,
    customer: Customer<'a>,
    splits: Vec<SplitLine<'a>>,
    expires_in: u32,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    charge: ChargeBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeBody {
    #[serde(rename = "correlationID")]
    correlation_id: String,
    #[serde(rename = "globalID", default)]
    global_id: String,
    value: i64,
    br_code: String,
    #[serde(default)]
    qr_code_image: String,
    #[serde(default)]
    payment_link_url: String,
    expires_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    #[serde(rename = "correlationID")]
    correlation_id: &'a str,
    value: i64,
}

#[derive(Debug, Deserialize)]
struct RefundEnvelope {
    refund: RefundBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundBody {
    #[serde(default)]
    end_to_end_id: String,
    value: i64,
    status: String,
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WithdrawEnvelope {
    transaction: WithdrawBody,
}

#[derive(Debug, Deserialize)]
struct WithdrawBody {
    #[serde(rename = "correlationID")]
    correlation_id: String,
    value: i64,
}

/// REST client for the OpenPix instant-payment API.
pub struct OpenPixClient {
    base_url: Url,
    app_id: String,
    charge_expires_in: u32,
    client: Client,
}

impl OpenPixClient {
    pub fn new(config: &OpenPixConfig) -> GatewayResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid base url: {e}")))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(GatewayError::from)?;

        Ok(Self {
            base_url,
            app_id: config.app_id.clone(),
            charge_expires_in: config.charge_expires_in,
            client,
        })
    }

    /// `base_url` joined with the given path segments, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport("base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> GatewayResult<T> {
        debug!(%url, "openpix request");
        let response = self
            .client
            .post(url)
            .header("Authorization", &self.app_id)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> GatewayResult<T> {
        debug!(%url, "openpix request");
        let response = self
            .client
            .get(url)
            .header("Authorization", &self.app_id)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

fn charge_request_body<'a>(request: &'a ChargeRequest, expires_in: u32) -> CreateChargeRequest<'a> {
    CreateChargeRequest {
        correlation_id: request.correlation_id.as_str(),
        value: request.split.total.value(),
        customer: Customer {
            name: &request.customer.name,
            email: &request.customer.email,
            phone: &request.customer.phone,
        },
        splits: vec![SplitLine {
            value: request.split.net.value(),
            pix_key: &request.subaccount_pix_key,
            split_type: SPLIT_SUB_ACCOUNT,
        }],
        expires_in,
    }
}

#[async_trait]
impl PaymentGateway for OpenPixClient {
    async fn create_subaccount(&self, name: &str, pix_key: &str) -> GatewayResult<String> {
        let url = self.endpoint(&["api", "v1", "subaccount"])?;
        let envelope: SubaccountEnvelope = self
            .post(url, &CreateSubaccountRequest { name, pix_key })
            .await?;
        Ok(envelope.subaccount.pix_key)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<Charge> {
        let url = self.endpoint(&["api", "v1", "charge"])?;
        let body = charge_request_body(request, self.charge_expires_in);
        let ChargeEnvelope { charge } = self.post(url, &body).await?;

        let correlation_id = ChargeCorrelationId::parse(&charge.correlation_id).ok_or_else(|| {
            GatewayError::Decode(format!("unexpected correlation id {}", charge.correlation_id))
        })?;

        Ok(Charge {
            correlation_id,
            gateway_charge_id: charge.global_id,
            value: Cents(charge.value),
            br_code: charge.br_code,
            qr_code_image: charge.qr_code_image,
            payment_link_url: charge.payment_link_url,
            expires_at: charge.expires_date,
        })
    }

    async fn get_balance(&self, pix_key: &str) -> GatewayResult<Cents> {
        let url = self.endpoint(&["api", "v1", "subaccount", pix_key])?;
        let envelope: SubaccountEnvelope = self.get(url).await?;
        Ok(Cents(envelope.subaccount.balance))
    }

    async fn withdraw_subaccount(&self, pix_key: &str) -> GatewayResult<Withdrawal> {
        let url = self.endpoint(&["api", "v1", "subaccount", pix_key, "withdraw"])?;
        let WithdrawEnvelope { transaction } = self.post(url, &serde_json::json!({})).await?;
        Ok(Withdrawal {
            correlation_id: transaction.correlation_id,
            value: Cents(transaction.value),
            requested_at: Utc::now(),
        })
    }

    async fn refund_charge(
        &self,
        charge: &ChargeCorrelationId,
        refund: &RefundCorrelationId,
        value: Cents,
    ) -> GatewayResult<Refund> {
        let url = self.endpoint(&["api", "v1", "charge", charge.as_str(), "refund"])?;
        let body = RefundRequest {
            correlation_id: refund.as_str(),
            value: value.value(),
        };
        let RefundEnvelope { refund: body } = self.post(url, &body).await?;

        Ok(Refund {
            correlation_id: refund.clone(),
            end_to_end_id: body.end_to_end_id,
            value: Cents(body.value),
            status: body.status,
            refunded_at: body.time.unwrap_or_else(Utc::now),
        })
    }
}
