use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::money::from_cents;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub invoice_id: i32,
    pub product_id: Option<i32>,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64, // quantity x unit price, recorded verbatim
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemDto {
    pub id: Option<i32>,
    pub product_id: Option<i32>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<Model> for InvoiceItemDto {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            product_id: model.product_id,
            description: model.description,
            quantity: model.quantity,
            unit_price: from_cents(model.unit_price_cents),
            subtotal: from_cents(model.subtotal_cents),
        }
    }
}
