use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::money::from_cents;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub invoice_id: i32,
    pub amount_cents: i64,
    pub method: String,
    pub payment_date: String,
    pub notes: Option<String>,
    pub status: String, // 'completed', 'pending'
    pub created_at: String,
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
pub struct InvoicePaymentDto {
    pub id: Option<i32>,
    pub amount: Decimal,
    pub method: String,
    pub payment_date: String,
    pub notes: Option<String>,
    pub status: String,
}

impl From<Model> for InvoicePaymentDto {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            amount: from_cents(model.amount_cents),
            method: model.method,
            payment_date: model.payment_date,
            notes: model.notes,
            status: model.status,
        }
    }
}
