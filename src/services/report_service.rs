//! Dashboard and sales reporting. Aggregation happens in memory over the
//! filtered rows; the data volumes of a back office keep this comfortably
//! cheap.

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::money::from_cents;
use crate::domain::ServiceError;
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::order::{self, Entity as Order};
use crate::models::order_item::{self, Entity as OrderItem};
use crate::models::product::Entity as Product;
use crate::models::refund::Entity as Refund;
use crate::models::user::Entity as User;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub products: u64,
    pub orders: u64,
    pub users: u64,
    pub invoices: u64,
    pub revenue: Decimal,
    pub outstanding_balance: Decimal,
}

/// Top-line numbers for the dashboard: entity counts, net revenue from
/// delivered orders, and the open balance across unsettled invoices.
pub async fn dashboard(db: &DatabaseConnection) -> Result<DashboardSummary, ServiceError> {
    let products = Product::find().count(db).await?;
    let orders = Order::find().count(db).await?;
    let users = User::find().count(db).await?;
    let invoices = Invoice::find().count(db).await?;

    let delivered = Order::find()
        .filter(order::Column::Status.eq("delivered"))
        .all(db)
        .await?;
    let gross_cents: i64 = delivered.iter().map(|o| o.total_cents).sum();

    let refunds = Refund::find().all(db).await?;
    let refunded_cents: i64 = refunds.iter().map(|r| r.amount_cents).sum();

    let open_invoices = Invoice::find()
        .filter(invoice::Column::PaymentStatus.is_in(["unpaid", "partial", "overdue"]))
        .filter(invoice::Column::Status.ne("cancelled"))
        .all(db)
        .await?;
    let outstanding_cents: i64 = open_invoices.iter().map(|i| i.balance_due_cents).sum();

    Ok(DashboardSummary {
        products,
        orders,
        users,
        invoices,
        revenue: from_cents(gross_cents - refunded_cents),
        outstanding_balance: from_cents(outstanding_cents),
    })
}

#[derive(Debug, Serialize)]
pub struct DaySales {
    pub date: String,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TopProduct {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct SalesReport {
    pub date_from: String,
    pub date_to: String,
    pub days: Vec<DaySales>,
    pub top_products: Vec<TopProduct>,
}

/// Orders-per-day and top products by quantity over an inclusive date range.
/// Cancelled orders are excluded.
pub async fn sales_report(
    db: &DatabaseConnection,
    date_from: &str,
    date_to: &str,
) -> Result<SalesReport, ServiceError> {
    if date_from > date_to {
        return Err(ServiceError::Validation(
            "date_from must not be after date_to".to_string(),
        ));
    }

    let orders = Order::find()
        .filter(order::Column::CreatedAt.gte(date_from))
        .filter(order::Column::CreatedAt.lt(format!("{}~", date_to)))
        .filter(order::Column::Status.ne("cancelled"))
        .order_by_asc(order::Column::CreatedAt)
        .all(db)
        .await?;

    let mut by_day: HashMap<String, (u64, i64)> = HashMap::new();
    for order in &orders {
        let day = order.created_at.chars().take(10).collect::<String>();
        let entry = by_day.entry(day).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += order.total_cents;
    }

    let mut days: Vec<DaySales> = by_day
        .into_iter()
        .map(|(date, (orders, cents))| DaySales {
            date,
            orders,
            revenue: from_cents(cents),
        })
        .collect();
    days.sort_by(|a, b| a.date.cmp(&b.date));

    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let mut quantities: HashMap<String, i64> = HashMap::new();
    if !order_ids.is_empty() {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?;
        for item in items {
            *quantities.entry(item.product_name).or_insert(0) += i64::from(item.quantity);
        }
    }

    let mut top_products: Vec<TopProduct> = quantities
        .into_iter()
        .map(|(name, quantity)| TopProduct { name, quantity })
        .collect();
    top_products.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_products.truncate(10);

    Ok(SalesReport {
        date_from: date_from.to_string(),
        date_to: date_to.to_string(),
        days,
        top_products,
    })
}
