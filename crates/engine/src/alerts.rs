//! Payment alerts from external providers and their typed payloads.
//!
//! Webhooks parse the provider body into a [`PaymentPayload`] at the boundary;
//! reconciliation only ever sees the typed form. The raw body is kept as an
//! opaque string for audit.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine, phone::normalize_kenyan_phone, util::new_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    Mpesa,
    Paystack,
    /// Bank transfers carry no parseable payload and are matched by hand.
    Bank,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mpesa => "mpesa",
            Self::Paystack => "paystack",
            Self::Bank => "bank",
        }
    }
}

impl TryFrom<&str> for Provider {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "mpesa" => Ok(Self::Mpesa),
            "paystack" => Ok(Self::Paystack),
            "bank" => Ok(Self::Bank),
            other => Err(EngineError::InvalidInput(format!(
                "invalid payment provider: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Pending,
    Processed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
        }
    }
}

impl TryFrom<&str> for AlertStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid alert status: {other}"
            ))),
        }
    }
}

/// Safaricom Daraja STK push callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MpesaCallback {
    #[serde(rename = "Body")]
    pub body: MpesaBody,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MpesaBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    pub result_code: i64,
    #[serde(default)]
    pub result_desc: Option<String>,
    #[serde(default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl MpesaCallback {
    fn item(&self, name: &str) -> Option<&serde_json::Value> {
        self.body
            .stk_callback
            .callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Only `ResultCode == 0` callbacks represent a completed payment.
    pub fn is_success(&self) -> bool {
        self.body.stk_callback.result_code == 0
    }

    pub fn receipt(&self) -> Option<String> {
        scalar_to_string(self.item("MpesaReceiptNumber")?)
    }

    /// Amount in whole shillings as sent by Daraja, converted to cents.
    pub fn amount(&self) -> ResultEngine<Money> {
        match self.item("Amount") {
            Some(serde_json::Value::Number(n)) => Money::from_json_number(n),
            Some(serde_json::Value::String(s)) => s.parse(),
            _ => Err(EngineError::InvalidAmount(
                "m-pesa callback without amount".to_string(),
            )),
        }
    }

    pub fn phone(&self) -> Option<String> {
        normalize_kenyan_phone(&scalar_to_string(self.item("PhoneNumber")?)?)
    }
}

/// Paystack webhook event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaystackEvent {
    pub event: String,
    pub data: PaystackCharge,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaystackCharge {
    pub reference: String,
    /// Already in minor units.
    pub amount: i64,
    #[serde(default)]
    pub customer: Option<PaystackCustomer>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaystackCustomer {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Any Paystack event, before the `data` object is read.
///
/// Paystack posts every subscribed event type to the same URL; only
/// `charge.success` carries a charge.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PaystackEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PaystackEnvelope {
    /// The typed charge event, or `None` for other event types.
    pub fn into_charge_event(self) -> Result<Option<PaystackEvent>, serde_json::Error> {
        if self.event != PaystackEvent::CHARGE_SUCCESS {
            return Ok(None);
        }
        let data = serde_json::from_value(self.data)?;
        Ok(Some(PaystackEvent {
            event: self.event,
            data,
        }))
    }
}

impl PaystackEvent {
    pub const CHARGE_SUCCESS: &'static str = "charge.success";

    pub fn is_charge_success(&self) -> bool {
        self.event == Self::CHARGE_SUCCESS
    }

    pub fn phone(&self) -> Option<String> {
        normalize_kenyan_phone(self.data.customer.as_ref()?.phone.as_deref()?)
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Provider payload after boundary parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentPayload {
    Mpesa(MpesaCallback),
    Paystack(PaystackEvent),
}

impl PaymentPayload {
    /// Parses a stored raw payload. `Bank` alerts have no typed payload.
    pub fn parse(provider: Provider, raw: &str) -> ResultEngine<Option<Self>> {
        let invalid = |err: serde_json::Error| {
            EngineError::InvalidInput(format!("invalid {} payload: {err}", provider.as_str()))
        };
        match provider {
            Provider::Mpesa => serde_json::from_str(raw)
                .map(|p| Some(Self::Mpesa(p)))
                .map_err(invalid),
            Provider::Paystack => serde_json::from_str(raw)
                .map(|p| Some(Self::Paystack(p)))
                .map_err(invalid),
            Provider::Bank => Ok(None),
        }
    }

    /// Payer phone in E.164 form, when the provider supplied a usable one.
    pub fn phone(&self) -> Option<String> {
        match self {
            Self::Mpesa(callback) => callback.phone(),
            Self::Paystack(event) => event.phone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAlert {
    pub id: String,
    pub provider: Provider,
    pub external_id: String,
    pub amount: Money,
    pub payload: String,
    pub status: AlertStatus,
    /// Set when the webhook URL named a chama.
    pub tenant_id: Option<String>,
    pub matched_member_id: Option<String>,
    pub ledger_entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Input for [`Engine::ingest_alert`](crate::Engine::ingest_alert).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAlert {
    pub provider: Provider,
    pub external_id: String,
    pub amount: Money,
    pub payload: String,
    pub tenant_id: Option<String>,
}

impl NewAlert {
    /// Alert for a successful STK callback; `None` for failed or cancelled
    /// payments and callbacks without a receipt.
    pub fn from_mpesa(
        callback: &MpesaCallback,
        raw: &str,
        tenant_id: Option<String>,
    ) -> ResultEngine<Option<Self>> {
        if !callback.is_success() {
            return Ok(None);
        }
        let Some(receipt) = callback.receipt() else {
            return Ok(None);
        };
        Ok(Some(Self {
            provider: Provider::Mpesa,
            external_id: receipt,
            amount: callback.amount()?,
            payload: raw.to_string(),
            tenant_id,
        }))
    }

    /// Alert for a `charge.success` event; `None` for any other event.
    pub fn from_paystack(
        event: &PaystackEvent,
        raw: &str,
        tenant_id: Option<String>,
    ) -> Option<Self> {
        event.is_charge_success().then(|| Self {
            provider: Provider::Paystack,
            external_id: event.data.reference.clone(),
            amount: Money::new(event.data.amount),
            payload: raw.to_string(),
            tenant_id,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub provider: String,
    pub external_id: String,
    pub amount_minor: i64,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub status: String,
    pub tenant_id: Option<String>,
    pub matched_member_id: Option<String>,
    pub ledger_entry_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn pending(alert: &NewAlert, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ActiveValue::Set(new_id()),
            provider: ActiveValue::Set(alert.provider.as_str().to_string()),
            external_id: ActiveValue::Set(alert.external_id.clone()),
            amount_minor: ActiveValue::Set(alert.amount.cents()),
            payload: ActiveValue::Set(alert.payload.clone()),
            status: ActiveValue::Set(AlertStatus::Pending.as_str().to_string()),
            tenant_id: ActiveValue::Set(alert.tenant_id.clone()),
            matched_member_id: ActiveValue::Set(None),
            ledger_entry_id: ActiveValue::Set(None),
            created_at: ActiveValue::Set(created_at),
            processed_at: ActiveValue::Set(None),
        }
    }
}

impl TryFrom<Model> for PaymentAlert {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            provider: Provider::try_from(model.provider.as_str())?,
            status: AlertStatus::try_from(model.status.as_str())?,
            id: model.id,
            external_id: model.external_id,
            amount: Money::new(model.amount_minor),
            payload: model.payload,
            tenant_id: model.tenant_id,
            matched_member_id: model.matched_member_id,
            ledger_entry_id: model.ledger_entry_id,
            created_at: model.created_at,
            processed_at: model.processed_at,
        })
    }
}
