//! Group investments (land, equipment, shares...).

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, util::new_id};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub purchase_date: NaiveDate,
    pub purchase_price: Money,
    pub current_value: Money,
    /// Opaque document URLs.
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewAsset {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub purchase_date: NaiveDate,
    pub purchase_price: Money,
    pub current_value: Money,
    pub documents: Vec<String>,
}

impl Asset {
    pub(crate) fn new(tenant_id: &str, input: NewAsset, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            name: input.name,
            description: input.description,
            category: input.category,
            purchase_date: input.purchase_date,
            purchase_price: input.purchase_price,
            current_value: input.current_value,
            documents: input.documents,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub purchase_date: Date,
    pub purchase_price_minor: i64,
    pub current_value_minor: i64,
    /// JSON array of URLs.
    #[sea_orm(column_type = "Text")]
    pub documents: String,
    pub created_at: DateTimeUtc,
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

impl TryFrom<&Asset> for ActiveModel {
    type Error = EngineError;

    fn try_from(asset: &Asset) -> Result<Self, Self::Error> {
        let documents = serde_json::to_string(&asset.documents)
            .map_err(|_| EngineError::InvalidInput("invalid asset documents".to_string()))?;
        Ok(Self {
            id: ActiveValue::Set(asset.id.clone()),
            tenant_id: ActiveValue::Set(asset.tenant_id.clone()),
            name: ActiveValue::Set(asset.name.clone()),
            description: ActiveValue::Set(asset.description.clone()),
            category: ActiveValue::Set(asset.category.clone()),
            purchase_date: ActiveValue::Set(asset.purchase_date),
            purchase_price_minor: ActiveValue::Set(asset.purchase_price.cents()),
            current_value_minor: ActiveValue::Set(asset.current_value.cents()),
            documents: ActiveValue::Set(documents),
            created_at: ActiveValue::Set(asset.created_at),
        })
    }
}

impl TryFrom<Model> for Asset {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let documents: Vec<String> = serde_json::from_str(&model.documents)
            .map_err(|_| EngineError::InvalidInput("invalid asset documents".to_string()))?;
        Ok(Self {
            id: model.id,
            tenant_id: model.tenant_id,
            name: model.name,
            description: model.description,
            category: model.category,
            purchase_date: model.purchase_date,
            purchase_price: Money::new(model.purchase_price_minor),
            current_value: Money::new(model.current_value_minor),
            documents,
            created_at: model.created_at,
        })
    }
}
