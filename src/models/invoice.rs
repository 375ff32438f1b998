use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::money::from_cents;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub invoice_number: String, // unique, INV-{year}-{4-digit-seq}
    pub customer_id: Option<i32>,
    pub invoice_date: String,
    pub due_date: Option<String>,
    pub subtotal_cents: i64,
    pub tax_rate_percent: String, // exact decimal percent, e.g. "7.5"
    pub tax_amount_cents: i64,
    pub total_amount_cents: i64,
    pub amount_paid_cents: i64,
    pub balance_due_cents: i64, // may go negative on overpayment
    pub payment_status: String, // 'unpaid', 'partial', 'paid', 'overdue', 'refunded'
    pub status: String,         // 'draft', 'sent', 'viewed', 'approved', 'rejected', 'cancelled'
    pub notes: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub viewed_at: Option<String>,
    pub paid_at: Option<String>,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::invoice_payment::Entity")]
    Payments,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Customer,
}

impl Related<super::invoice_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::invoice_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn tax_rate(&self) -> Decimal {
        Decimal::from_str(&self.tax_rate_percent).unwrap_or(Decimal::ZERO)
    }
}

// DTO for API responses; amounts as decimal currency values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDto {
    pub id: i32,
    pub invoice_number: String,
    pub customer_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub invoice_date: String,
    pub due_date: Option<String>,
    pub subtotal: Decimal,
    pub tax_rate_percent: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_status: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub viewed_at: Option<String>,
    pub paid_at: Option<String>,
    pub updated_at: String,
}

impl From<Model> for InvoiceDto {
    fn from(model: Model) -> Self {
        let tax_rate = model.tax_rate();
        Self {
            id: model.id,
            invoice_number: model.invoice_number,
            customer_id: model.customer_id,
            customer_name: None,
            invoice_date: model.invoice_date,
            due_date: model.due_date,
            subtotal: from_cents(model.subtotal_cents),
            tax_rate_percent: tax_rate,
            tax_amount: from_cents(model.tax_amount_cents),
            total_amount: from_cents(model.total_amount_cents),
            amount_paid: from_cents(model.amount_paid_cents),
            balance_due: from_cents(model.balance_due_cents),
            payment_status: model.payment_status,
            status: model.status,
            notes: model.notes,
            created_at: model.created_at,
            sent_at: model.sent_at,
            viewed_at: model.viewed_at,
            paid_at: model.paid_at,
            updated_at: model.updated_at,
        }
    }
}
