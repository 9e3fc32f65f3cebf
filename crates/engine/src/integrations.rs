//! Payment provider accounts configured by a chama.
//!
//! The settings object is provider specific (M-Pesa short code and keys,
//! Paystack keys, bank account details) and is stored as JSON text.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EngineError, Provider, ResultEngine, util::new_id};

pub type IntegrationConfig = Map<String, Value>;

/// Settings a provider account cannot work without.
pub fn required_settings(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Mpesa => &["shortCode", "passkey", "consumerKey", "consumerSecret"],
        Provider::Paystack => &["publicKey", "secretKey"],
        Provider::Bank => &["bankName", "accountName", "accountNumber"],
    }
}

/// Settings holding credentials.
pub const SECRET_SETTINGS: &[&str] = &[
    "passkey",
    "consumerKey",
    "consumerSecret",
    "secretKey",
    "apiKey",
];

/// Checks that `config` is an object carrying every required setting as a
/// non-empty string. Extra settings are kept as given.
pub(crate) fn validate_config(provider: Provider, config: Value) -> ResultEngine<IntegrationConfig> {
    let Value::Object(config) = config else {
        return Err(EngineError::InvalidInput(
            "integration config must be a JSON object".to_string(),
        ));
    };
    for key in required_settings(provider) {
        let present = config
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|value| !value.trim().is_empty());
        if !present {
            return Err(EngineError::InvalidInput(format!(
                "{} integration needs {key}",
                provider.as_str()
            )));
        }
    }
    Ok(config)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub tenant_id: String,
    pub provider: Provider,
    pub name: String,
    pub config: IntegrationConfig,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewIntegration {
    pub provider: Provider,
    pub name: String,
    pub config: Value,
    pub is_enabled: bool,
}

/// Partial update; the provider of an integration never changes.
#[derive(Clone, Debug, Default)]
pub struct IntegrationUpdate {
    pub name: Option<String>,
    pub config: Option<Value>,
    pub is_enabled: Option<bool>,
}

impl Integration {
    pub(crate) fn new(
        tenant_id: &str,
        provider: Provider,
        name: String,
        config: IntegrationConfig,
        is_enabled: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            provider,
            name,
            config,
            is_enabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Settings with credential values masked.
    pub fn redacted_config(&self) -> IntegrationConfig {
        self.config
            .iter()
            .map(|(key, value)| {
                let value = if SECRET_SETTINGS.contains(&key.as_str()) {
                    Value::String("********".to_string())
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub provider: String,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub config: String,
    pub is_enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn config_text(config: &IntegrationConfig) -> ResultEngine<String> {
    serde_json::to_string(config)
        .map_err(|_| EngineError::InvalidInput("invalid integration config".to_string()))
}

impl TryFrom<&Integration> for ActiveModel {
    type Error = EngineError;

    fn try_from(integration: &Integration) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActiveValue::Set(integration.id.clone()),
            tenant_id: ActiveValue::Set(integration.tenant_id.clone()),
            provider: ActiveValue::Set(integration.provider.as_str().to_string()),
            name: ActiveValue::Set(integration.name.clone()),
            config: ActiveValue::Set(config_text(&integration.config)?),
            is_enabled: ActiveValue::Set(integration.is_enabled),
            created_at: ActiveValue::Set(integration.created_at),
            updated_at: ActiveValue::Set(integration.updated_at),
        })
    }
}

impl ActiveModel {
    pub(crate) fn set_config(&mut self, config: &IntegrationConfig) -> ResultEngine<()> {
        self.config = ActiveValue::Set(config_text(config)?);
        Ok(())
    }
}

impl TryFrom<Model> for Integration {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let config: IntegrationConfig = serde_json::from_str(&model.config)
            .map_err(|_| EngineError::InvalidInput("invalid integration config".to_string()))?;
        Ok(Self {
            id: model.id,
            tenant_id: model.tenant_id,
            provider: Provider::try_from(model.provider.as_str())?,
            name: model.name,
            config,
            is_enabled: model.is_enabled,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mpesa_needs_its_keys() {
        let err = validate_config(
            Provider::Mpesa,
            json!({ "shortCode": "174379", "passkey": "bfb2", "consumerKey": " " }),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(msg) if msg.contains("consumerKey")));

        let config = validate_config(
            Provider::Mpesa,
            json!({
                "shortCode": "174379",
                "passkey": "bfb2",
                "consumerKey": "ck",
                "consumerSecret": "cs",
                "environment": "sandbox"
            }),
        )
        .unwrap();
        assert_eq!(config["environment"], "sandbox");
    }

    #[test]
    fn config_must_be_an_object() {
        assert!(validate_config(Provider::Bank, json!(["bankName"])).is_err());
        assert!(validate_config(Provider::Paystack, Value::Null).is_err());
    }

    #[test]
    fn bank_api_key_is_optional_and_masked() {
        let config = validate_config(
            Provider::Bank,
            json!({
                "bankName": "KCB",
                "accountName": "Umoja Investment Group",
                "accountNumber": "1234567890",
                "apiKey": "live-key"
            }),
        )
        .unwrap();
        let integration = Integration::new(
            "t1",
            Provider::Bank,
            "KCB account".to_string(),
            config,
            true,
            Utc::now(),
        );
        let redacted = integration.redacted_config();
        assert_eq!(redacted["apiKey"], "********");
        assert_eq!(redacted["accountNumber"], "1234567890");
    }
}
