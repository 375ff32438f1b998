use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shop_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub shop_name: String,
    pub address: Option<String>,
    pub default_tax_rate_percent: String,
    pub currency_symbol: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn default_tax_rate(&self) -> Decimal {
        Decimal::from_str(&self.default_tax_rate_percent).unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSettingsDto {
    pub shop_name: String,
    pub address: Option<String>,
    pub default_tax_rate_percent: Decimal,
    pub currency_symbol: String,
}

impl From<Model> for ShopSettingsDto {
    fn from(model: Model) -> Self {
        let rate = model.default_tax_rate();
        Self {
            shop_name: model.shop_name,
            address: model.address,
            default_tax_rate_percent: rate,
            currency_symbol: model.currency_symbol,
        }
    }
}
