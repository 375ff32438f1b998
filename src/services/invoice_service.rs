//! Invoice ledger: totals calculator, payment reconciler, lifecycle actions.
//!
//! All money math runs on `Decimal` and is rounded to cents only when the
//! result is persisted. The reconciler always works inside a transaction that
//! re-reads the invoice row, so two simultaneous payment submissions cannot
//! lose an update.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::domain::errors::is_unique_violation;
use crate::domain::money::to_cents;
use crate::domain::{AuthContext, ServiceError};
use crate::models::invoice::{self, Entity as Invoice, InvoiceDto};
use crate::models::invoice_item::{self, Entity as InvoiceItem, InvoiceItemDto};
use crate::models::invoice_payment::{self, Entity as InvoicePayment, InvoicePaymentDto};
use crate::models::shop_settings::{Entity as ShopSettings, ShopSettingsDto};
use crate::models::user::Entity as User;

pub const PAYMENT_COMPLETED: &str = "completed";

/// One invoice line as submitted by the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub product_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Pure totals computation: subtotal = sum(qty x price), tax = subtotal x rate / 100.
/// No rounding happens here; callers round when persisting or displaying.
pub fn compute_totals(items: &[LineItem], tax_rate_percent: Decimal) -> Result<Totals, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::Validation(
            "invoice must have at least one line item".to_string(),
        ));
    }
    if tax_rate_percent < Decimal::ZERO {
        return Err(ServiceError::Validation(
            "tax rate must not be negative".to_string(),
        ));
    }

    let mut subtotal = Decimal::ZERO;
    for (i, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "line {}: quantity must be greater than zero",
                i + 1
            )));
        }
        if item.unit_price <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "line {}: unit price must be greater than zero",
                i + 1
            )));
        }
        subtotal += Decimal::from(item.quantity) * item.unit_price;
    }

    let tax_amount = subtotal * tax_rate_percent / Decimal::ONE_HUNDRED;
    Ok(Totals {
        subtotal,
        tax_amount,
        total_amount: subtotal + tax_amount,
    })
}

/// Presentation-side payment status: stored classification refreshed with the
/// overdue check. `refunded` is sticky.
pub fn derive_payment_status(
    stored: &str,
    total_cents: i64,
    paid_cents: i64,
    due_date: Option<&str>,
    today: NaiveDate,
) -> String {
    if stored == "refunded" {
        return "refunded".to_string();
    }
    if paid_cents >= total_cents {
        return "paid".to_string();
    }
    if let Some(due) = due_date {
        if let Ok(due) = NaiveDate::parse_from_str(due, "%Y-%m-%d") {
            if due < today {
                return "overdue".to_string();
            }
        }
    }
    if paid_cents > 0 {
        "partial".to_string()
    } else {
        "unpaid".to_string()
    }
}

fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Sum of completed payments, read from the ledger table rather than the
/// invoice's amount_paid column (which may be stale during an edit).
async fn completed_payment_sum<C: ConnectionTrait>(
    conn: &C,
    invoice_id: i32,
) -> Result<i64, ServiceError> {
    let payments = InvoicePayment::find()
        .filter(invoice_payment::Column::InvoiceId.eq(invoice_id))
        .filter(invoice_payment::Column::Status.eq(PAYMENT_COMPLETED))
        .all(conn)
        .await?;
    Ok(payments.iter().map(|p| p.amount_cents).sum())
}

async fn insert_items<C: ConnectionTrait>(
    conn: &C,
    invoice_id: i32,
    items: &[LineItem],
) -> Result<(), ServiceError> {
    for item in items {
        let line_subtotal = Decimal::from(item.quantity) * item.unit_price;
        let row = invoice_item::ActiveModel {
            invoice_id: Set(invoice_id),
            product_id: Set(item.product_id),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_price_cents: Set(to_cents(item.unit_price)),
            subtotal_cents: Set(to_cents(line_subtotal)),
            ..Default::default()
        };
        row.insert(conn).await?;
    }
    Ok(())
}

/// Next free sequence for the year, formatted INV-{year}-{seq:04}.
async fn next_invoice_number<C: ConnectionTrait>(
    conn: &C,
    year: i32,
    offset: u32,
) -> Result<String, ServiceError> {
    let prefix = format!("INV-{}-", year);
    let last = Invoice::find()
        .filter(invoice::Column::InvoiceNumber.starts_with(&prefix))
        .order_by_desc(invoice::Column::InvoiceNumber)
        .one(conn)
        .await?;

    let next_seq = last
        .and_then(|inv| {
            inv.invoice_number
                .rsplit('-')
                .next()
                .and_then(|s| s.parse::<u32>().ok())
        })
        .unwrap_or(0)
        + 1
        + offset;

    Ok(format!("{}{:04}", prefix, next_seq))
}

#[derive(Debug, Deserialize)]
pub struct NewInvoice {
    pub customer_id: Option<i32>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub tax_rate_percent: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub send_immediately: bool,
}

/// Create an invoice (draft, or immediately sent). Retries the generated
/// invoice number on a unique-constraint conflict.
pub async fn create_invoice(
    db: &DatabaseConnection,
    data: NewInvoice,
) -> Result<InvoiceDto, ServiceError> {
    let tax_rate = match data.tax_rate_percent {
        Some(rate) => rate,
        None => ShopSettings::find()
            .one(db)
            .await?
            .map(|s| s.default_tax_rate())
            .unwrap_or(Decimal::ZERO),
    };
    let totals = compute_totals(&data.items, tax_rate)?;

    let now = now_ts();
    let year = Utc::now().format("%Y").to_string().parse::<i32>().unwrap_or(1970);
    let total_cents = to_cents(totals.total_amount);

    for attempt in 0..5u32 {
        let number = next_invoice_number(db, year, attempt).await?;
        let txn = db.begin().await?;

        let model = invoice::ActiveModel {
            invoice_number: Set(number.clone()),
            customer_id: Set(data.customer_id),
            invoice_date: Set(data.invoice_date.clone().unwrap_or_else(today)),
            due_date: Set(data.due_date.clone()),
            subtotal_cents: Set(to_cents(totals.subtotal)),
            tax_rate_percent: Set(tax_rate.to_string()),
            tax_amount_cents: Set(to_cents(totals.tax_amount)),
            total_amount_cents: Set(total_cents),
            amount_paid_cents: Set(0),
            balance_due_cents: Set(total_cents),
            payment_status: Set("unpaid".to_string()),
            status: Set(if data.send_immediately {
                "sent".to_string()
            } else {
                "draft".to_string()
            }),
            notes: Set(data.notes.clone()),
            created_at: Set(now.clone()),
            sent_at: Set(data.send_immediately.then(|| now.clone())),
            updated_at: Set(now.clone()),
            ..Default::default()
        };

        match model.insert(&txn).await {
            Ok(saved) => {
                insert_items(&txn, saved.id, &data.items).await?;
                txn.commit().await?;
                tracing::info!(invoice = %number, "invoice created");
                return Ok(InvoiceDto::from(saved));
            }
            Err(e) if is_unique_violation(&e) => {
                // Another request took this number; regenerate and retry
                txn.rollback().await?;
                tracing::warn!(invoice = %number, "invoice number conflict, retrying");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServiceError::Conflict(
        "could not allocate a unique invoice number".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoice {
    pub customer_id: Option<i32>,
    pub due_date: Option<String>,
    pub tax_rate_percent: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
}

/// Edit path: line items are fully replaced, totals recomputed, and the
/// balance reconciled against the sum of completed payments - never the
/// possibly stale amount_paid column.
pub async fn update_invoice(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateInvoice,
) -> Result<InvoiceDto, ServiceError> {
    let txn = db.begin().await?;

    let existing = Invoice::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.status == "cancelled" {
        return Err(ServiceError::Validation(
            "a cancelled invoice cannot be edited".to_string(),
        ));
    }

    let tax_rate = data.tax_rate_percent.unwrap_or_else(|| existing.tax_rate());
    let totals = compute_totals(&data.items, tax_rate)?;

    InvoiceItem::delete_many()
        .filter(invoice_item::Column::InvoiceId.eq(id))
        .exec(&txn)
        .await?;
    insert_items(&txn, id, &data.items).await?;

    let paid_cents = completed_payment_sum(&txn, id).await?;
    let total_cents = to_cents(totals.total_amount);
    let was_paid_at = existing.paid_at.clone();
    let now = now_ts();

    let mut active: invoice::ActiveModel = existing.into();
    if let Some(customer_id) = data.customer_id {
        active.customer_id = Set(Some(customer_id));
    }
    if let Some(due_date) = data.due_date {
        active.due_date = Set(Some(due_date));
    }
    if let Some(notes) = data.notes {
        active.notes = Set(Some(notes));
    }
    active.subtotal_cents = Set(to_cents(totals.subtotal));
    active.tax_rate_percent = Set(tax_rate.to_string());
    active.tax_amount_cents = Set(to_cents(totals.tax_amount));
    active.total_amount_cents = Set(total_cents);
    active.amount_paid_cents = Set(paid_cents);
    active.balance_due_cents = Set(total_cents - paid_cents);
    let now_paid = paid_cents >= total_cents;
    active.payment_status = Set(if now_paid {
        "paid".to_string()
    } else if paid_cents > 0 {
        "partial".to_string()
    } else {
        "unpaid".to_string()
    });
    if now_paid && was_paid_at.is_none() {
        active.paid_at = Set(Some(now.clone()));
    }
    active.updated_at = Set(now);

    let saved = active.update(&txn).await?;
    txn.commit().await?;

    Ok(InvoiceDto::from(saved))
}

#[derive(Debug, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: Option<String>,
    pub payment_date: Option<String>,
    pub notes: Option<String>,
}

/// Record a payment against an invoice and reconcile the ledger fields.
///
/// Overpayment is accepted without a cap; the resulting negative balance is
/// surfaced as-is. The invoice row is re-read inside the transaction so
/// concurrent submissions serialize instead of losing an update.
pub async fn apply_payment(
    db: &DatabaseConnection,
    invoice_id: i32,
    payment: NewPayment,
) -> Result<(InvoiceDto, InvoicePaymentDto), ServiceError> {
    if payment.amount <= Decimal::ZERO {
        return Err(ServiceError::Validation(
            "payment amount must be greater than zero".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let existing = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.status == "cancelled" {
        return Err(ServiceError::Validation(
            "cannot record a payment on a cancelled invoice".to_string(),
        ));
    }

    let now = now_ts();
    let payment_row = invoice_payment::ActiveModel {
        invoice_id: Set(invoice_id),
        amount_cents: Set(to_cents(payment.amount)),
        method: Set(payment.method.unwrap_or_else(|| "other".to_string())),
        payment_date: Set(payment.payment_date.unwrap_or_else(today)),
        notes: Set(payment.notes),
        status: Set(PAYMENT_COMPLETED.to_string()),
        created_at: Set(now.clone()),
        ..Default::default()
    };
    let saved_payment = payment_row.insert(&txn).await?;

    let paid_cents = existing.amount_paid_cents + saved_payment.amount_cents;
    let total_cents = existing.total_amount_cents;
    let was_paid_at = existing.paid_at.clone();

    let mut active: invoice::ActiveModel = existing.into();
    active.amount_paid_cents = Set(paid_cents);
    active.balance_due_cents = Set(total_cents - paid_cents);
    let now_paid = total_cents <= paid_cents;
    active.payment_status = Set(if now_paid {
        "paid".to_string()
    } else {
        "partial".to_string()
    });
    // paid_at stamps once, on the transition into paid
    if now_paid && was_paid_at.is_none() {
        active.paid_at = Set(Some(now.clone()));
    }
    active.updated_at = Set(now);

    let saved = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        invoice = %saved.invoice_number,
        amount_cents = saved_payment.amount_cents,
        "payment recorded"
    );

    Ok((
        InvoiceDto::from(saved),
        InvoicePaymentDto::from(saved_payment),
    ))
}

/// Mark sent: stamps sent_at once; resending keeps the original stamp.
pub async fn send_invoice(db: &DatabaseConnection, id: i32) -> Result<InvoiceDto, ServiceError> {
    let existing = Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.status == "cancelled" {
        return Err(ServiceError::Validation(
            "a cancelled invoice cannot be sent".to_string(),
        ));
    }

    let already_sent = existing.sent_at.clone();
    let mut active: invoice::ActiveModel = existing.into();
    let now = now_ts();
    if already_sent.is_none() {
        active.sent_at = Set(Some(now.clone()));
    }
    active.status = Set("sent".to_string());
    active.updated_at = Set(now);

    Ok(InvoiceDto::from(active.update(db).await?))
}

/// Customer-viewed tracking; the first view wins.
pub async fn mark_viewed(db: &DatabaseConnection, id: i32) -> Result<InvoiceDto, ServiceError> {
    let existing = Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let first_view = existing.viewed_at.is_none();
    let was_sent = existing.status == "sent";
    let mut active: invoice::ActiveModel = existing.into();
    let now = now_ts();
    if first_view {
        active.viewed_at = Set(Some(now.clone()));
    }
    if was_sent {
        active.status = Set("viewed".to_string());
    }
    active.updated_at = Set(now);

    Ok(InvoiceDto::from(active.update(db).await?))
}

pub async fn cancel_invoice(db: &DatabaseConnection, id: i32) -> Result<InvoiceDto, ServiceError> {
    let existing = Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.status == "cancelled" {
        return Err(ServiceError::Validation(
            "invoice is already cancelled".to_string(),
        ));
    }

    let mut active: invoice::ActiveModel = existing.into();
    active.status = Set("cancelled".to_string());
    active.updated_at = Set(now_ts());

    Ok(InvoiceDto::from(active.update(db).await?))
}

/// Admin-only hard delete; items and payments go with the invoice.
pub async fn delete_invoice(
    db: &DatabaseConnection,
    auth: &AuthContext,
    id: i32,
) -> Result<(), ServiceError> {
    auth.require_admin()?;

    let txn = db.begin().await?;

    Invoice::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(ServiceError::NotFound)?;

    InvoicePayment::delete_many()
        .filter(invoice_payment::Column::InvoiceId.eq(id))
        .exec(&txn)
        .await?;
    InvoiceItem::delete_many()
        .filter(invoice_item::Column::InvoiceId.eq(id))
        .exec(&txn)
        .await?;
    Invoice::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    tracing::info!(invoice_id = id, "invoice deleted");
    Ok(())
}

/// Filter parameters for listing invoices
#[derive(Debug, Default, Clone)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub customer_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// List invoices with related customer names. The payment status in the
/// result is refreshed with the overdue check.
pub async fn list_invoices(
    db: &DatabaseConnection,
    filter: InvoiceFilter,
) -> Result<Vec<InvoiceDto>, ServiceError> {
    let mut condition = Condition::all();

    if let Some(status) = filter.status {
        condition = condition.add(invoice::Column::Status.eq(status));
    }
    if let Some(customer_id) = filter.customer_id {
        condition = condition.add(invoice::Column::CustomerId.eq(customer_id));
    }
    if let Some(from) = filter.date_from {
        condition = condition.add(invoice::Column::InvoiceDate.gte(from));
    }
    if let Some(to) = filter.date_to {
        condition = condition.add(invoice::Column::InvoiceDate.lte(to));
    }

    let invoices = Invoice::find()
        .filter(condition)
        .order_by_desc(invoice::Column::InvoiceDate)
        .find_also_related(User)
        .all(db)
        .await?;

    let today = Utc::now().date_naive();
    let mut result = Vec::new();
    for (inv, customer) in invoices {
        let payment_status = derive_payment_status(
            &inv.payment_status,
            inv.total_amount_cents,
            inv.amount_paid_cents,
            inv.due_date.as_deref(),
            today,
        );
        // payment_status filter applies to the derived value so 'overdue' works
        if let Some(wanted) = &filter.payment_status {
            if &payment_status != wanted {
                continue;
            }
        }
        let mut dto = InvoiceDto::from(inv);
        dto.payment_status = payment_status;
        dto.customer_name = customer.map(|c| c.username);
        result.push(dto);
    }

    Ok(result)
}

/// Fully-resolved invoice view: header, items, payments and shop settings.
/// This is the view model handed to the external PDF/print renderer.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub invoice: InvoiceDto,
    pub items: Vec<InvoiceItemDto>,
    pub payments: Vec<InvoicePaymentDto>,
    pub settings: Option<ShopSettingsDto>,
}

pub async fn get_invoice_view(
    db: &DatabaseConnection,
    id: i32,
) -> Result<InvoiceView, ServiceError> {
    let inv = Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let items = InvoiceItem::find()
        .filter(invoice_item::Column::InvoiceId.eq(id))
        .all(db)
        .await?;
    let payments = InvoicePayment::find()
        .filter(invoice_payment::Column::InvoiceId.eq(id))
        .order_by_desc(invoice_payment::Column::PaymentDate)
        .all(db)
        .await?;
    let settings = ShopSettings::find().one(db).await?;

    let customer_name = match inv.customer_id {
        Some(customer_id) => User::find_by_id(customer_id)
            .one(db)
            .await?
            .map(|u| u.username),
        None => None,
    };

    let payment_status = derive_payment_status(
        &inv.payment_status,
        inv.total_amount_cents,
        inv.amount_paid_cents,
        inv.due_date.as_deref(),
        Utc::now().date_naive(),
    );
    let mut dto = InvoiceDto::from(inv);
    dto.payment_status = payment_status;
    dto.customer_name = customer_name;

    Ok(InvoiceView {
        invoice: dto,
        items: items.into_iter().map(InvoiceItemDto::from).collect(),
        payments: payments.into_iter().map(InvoicePaymentDto::from).collect(),
        settings: settings.map(ShopSettingsDto::from),
    })
}
