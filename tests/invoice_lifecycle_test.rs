use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use shopadmin::db;
use shopadmin::domain::{AuthContext, ServiceError};
use shopadmin::services::invoice_service::{
    self, LineItem, NewInvoice, NewPayment, UpdateInvoice,
};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// Helper to create a customer account
async fn create_test_customer(db: &DatabaseConnection, username: &str) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let user = shopadmin::models::user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set("hash".to_string()),
        role: Set("customer".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    user.insert(db).await.expect("Failed to create customer").id
}

fn item(description: &str, quantity: i32, unit_price: rust_decimal::Decimal) -> LineItem {
    LineItem {
        description: description.to_string(),
        quantity,
        unit_price,
        product_id: None,
    }
}

fn new_invoice(customer_id: i32, items: Vec<LineItem>) -> NewInvoice {
    NewInvoice {
        customer_id: Some(customer_id),
        invoice_date: None,
        due_date: None,
        tax_rate_percent: Some(dec!(10)),
        notes: None,
        items,
        send_immediately: false,
    }
}

fn admin() -> AuthContext {
    AuthContext {
        user_id: Some(1),
        role: Some("admin".to_string()),
    }
}

#[tokio::test]
async fn test_create_invoice_totals_and_numbering() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;

    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .expect("Failed to create invoice");

    let year = chrono::Utc::now().format("%Y").to_string();
    assert_eq!(invoice.invoice_number, format!("INV-{}-0001", year));
    assert_eq!(invoice.subtotal, dec!(100.00));
    assert_eq!(invoice.tax_amount, dec!(10.00));
    assert_eq!(invoice.total_amount, dec!(110.00));
    assert_eq!(invoice.balance_due, dec!(110.00));
    assert_eq!(invoice.status, "draft");
    assert_eq!(invoice.payment_status, "unpaid");
    assert!(invoice.sent_at.is_none());

    let second = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Gadget", 1, dec!(5))]),
    )
    .await
    .expect("Failed to create second invoice");
    assert_eq!(second.invoice_number, format!("INV-{}-0002", year));
}

#[tokio::test]
async fn test_empty_invoice_rejected() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;

    let result = invoice_service::create_invoice(&db, new_invoice(customer, vec![])).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_full_payment_settles_invoice() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .unwrap();

    let (updated, payment) = invoice_service::apply_payment(
        &db,
        invoice.id,
        NewPayment {
            amount: dec!(110),
            method: Some("card".to_string()),
            payment_date: None,
            notes: None,
        },
    )
    .await
    .expect("Failed to record payment");

    assert_eq!(payment.amount, dec!(110.00));
    assert_eq!(updated.amount_paid, dec!(110.00));
    assert_eq!(updated.balance_due, dec!(0.00));
    assert_eq!(updated.payment_status, "paid");
    assert!(updated.paid_at.is_some());
}

#[tokio::test]
async fn test_partial_payments_accumulate() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .unwrap();

    let pay = |amount| NewPayment {
        amount,
        method: None,
        payment_date: None,
        notes: None,
    };

    let (after_first, _) = invoice_service::apply_payment(&db, invoice.id, pay(dec!(50)))
        .await
        .unwrap();
    assert_eq!(after_first.payment_status, "partial");
    assert_eq!(after_first.balance_due, dec!(60.00));
    assert!(after_first.paid_at.is_none());

    let (after_second, _) = invoice_service::apply_payment(&db, invoice.id, pay(dec!(50)))
        .await
        .unwrap();
    assert_eq!(after_second.payment_status, "partial");
    assert_eq!(after_second.balance_due, dec!(10.00));

    // crossing the exact total settles it
    let (after_third, _) = invoice_service::apply_payment(&db, invoice.id, pay(dec!(10)))
        .await
        .unwrap();
    assert_eq!(after_third.payment_status, "paid");
    assert_eq!(after_third.balance_due, dec!(0.00));
    assert!(after_third.paid_at.is_some());
}

#[tokio::test]
async fn test_overpayment_goes_negative() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .unwrap();

    let (updated, _) = invoice_service::apply_payment(
        &db,
        invoice.id,
        NewPayment {
            amount: dec!(150),
            method: None,
            payment_date: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.payment_status, "paid");
    assert_eq!(updated.balance_due, dec!(-40.00));
}

#[tokio::test]
async fn test_non_positive_payment_rejected() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 1, dec!(10))]),
    )
    .await
    .unwrap();

    for amount in [dec!(0), dec!(-5)] {
        let result = invoice_service::apply_payment(
            &db,
            invoice.id,
            NewPayment {
                amount,
                method: None,
                payment_date: None,
                notes: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}

#[tokio::test]
async fn test_edit_reconciles_against_payment_ledger() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .unwrap();

    invoice_service::apply_payment(
        &db,
        invoice.id,
        NewPayment {
            amount: dec!(60),
            method: None,
            payment_date: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    // shrink the invoice below what was already paid
    let updated = invoice_service::update_invoice(
        &db,
        invoice.id,
        UpdateInvoice {
            customer_id: None,
            due_date: None,
            tax_rate_percent: Some(dec!(10)),
            notes: None,
            items: vec![item("Widget", 1, dec!(50))],
        },
    )
    .await
    .expect("Failed to update invoice");

    assert_eq!(updated.total_amount, dec!(55.00));
    assert_eq!(updated.amount_paid, dec!(60.00));
    assert_eq!(updated.balance_due, dec!(-5.00));
    assert_eq!(updated.payment_status, "paid");
    assert!(updated.paid_at.is_some());
}

#[tokio::test]
async fn test_cancelled_invoice_is_frozen() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 1, dec!(10))]),
    )
    .await
    .unwrap();

    invoice_service::cancel_invoice(&db, invoice.id).await.unwrap();

    let edit = invoice_service::update_invoice(
        &db,
        invoice.id,
        UpdateInvoice {
            customer_id: None,
            due_date: None,
            tax_rate_percent: None,
            notes: None,
            items: vec![item("Widget", 2, dec!(10))],
        },
    )
    .await;
    assert!(matches!(edit, Err(ServiceError::Validation(_))));

    let pay = invoice_service::apply_payment(
        &db,
        invoice.id,
        NewPayment {
            amount: dec!(5),
            method: None,
            payment_date: None,
            notes: None,
        },
    )
    .await;
    assert!(matches!(pay, Err(ServiceError::Validation(_))));

    let again = invoice_service::cancel_invoice(&db, invoice.id).await;
    assert!(matches!(again, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_send_and_view_stamps() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 1, dec!(10))]),
    )
    .await
    .unwrap();

    let sent = invoice_service::send_invoice(&db, invoice.id).await.unwrap();
    assert_eq!(sent.status, "sent");
    let first_stamp = sent.sent_at.clone().expect("sent_at missing");

    // resend keeps the original stamp
    let resent = invoice_service::send_invoice(&db, invoice.id).await.unwrap();
    assert_eq!(resent.sent_at, Some(first_stamp));

    let viewed = invoice_service::mark_viewed(&db, invoice.id).await.unwrap();
    assert_eq!(viewed.status, "viewed");
    assert!(viewed.viewed_at.is_some());
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;
    let invoice = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 1, dec!(10))]),
    )
    .await
    .unwrap();

    let staff = AuthContext {
        user_id: Some(2),
        role: Some("staff".to_string()),
    };
    let denied = invoice_service::delete_invoice(&db, &staff, invoice.id).await;
    assert!(matches!(denied, Err(ServiceError::Forbidden)));

    invoice_service::apply_payment(
        &db,
        invoice.id,
        NewPayment {
            amount: dec!(5),
            method: None,
            payment_date: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    invoice_service::delete_invoice(&db, &admin(), invoice.id)
        .await
        .expect("Admin delete failed");

    use shopadmin::models::{invoice_item, invoice_payment};
    let items = invoice_item::Entity::find()
        .filter(invoice_item::Column::InvoiceId.eq(invoice.id))
        .all(&db)
        .await
        .unwrap();
    let payments = invoice_payment::Entity::find()
        .filter(invoice_payment::Column::InvoiceId.eq(invoice.id))
        .all(&db)
        .await
        .unwrap();
    assert!(items.is_empty());
    assert!(payments.is_empty());

    let gone = invoice_service::get_invoice_view(&db, invoice.id).await;
    assert!(matches!(gone, Err(ServiceError::NotFound)));
}

#[tokio::test]
async fn test_concurrent_payments_both_land_in_ledger() {
    // a file-backed database gives the pool real concurrent connections,
    // unlike sqlite::memory:
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("shop.db").display());
    let db = db::init_db(&url).await.expect("Failed to init DB");

    let customer = create_test_customer(&db, "alice").await;
    let created = invoice_service::create_invoice(
        &db,
        new_invoice(customer, vec![item("Widget", 2, dec!(50))]),
    )
    .await
    .unwrap();

    // a writer that loses the race surfaces a storage error; retry until it lands
    async fn pay_until_applied(
        db: &DatabaseConnection,
        invoice_id: i32,
        amount: rust_decimal::Decimal,
    ) {
        for _ in 0..50 {
            let result = invoice_service::apply_payment(
                db,
                invoice_id,
                NewPayment {
                    amount,
                    method: None,
                    payment_date: None,
                    notes: None,
                },
            )
            .await;
            match result {
                Ok(_) => return,
                Err(ServiceError::Storage(_)) => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                Err(other) => panic!("payment failed: {:?}", other),
            }
        }
        panic!("payment was never applied");
    }

    tokio::join!(
        pay_until_applied(&db, created.id, dec!(50)),
        pay_until_applied(&db, created.id, dec!(50)),
    );

    use shopadmin::models::{invoice, invoice_payment};
    let ledger_total: i64 = invoice_payment::Entity::find()
        .filter(invoice_payment::Column::InvoiceId.eq(created.id))
        .filter(invoice_payment::Column::Status.eq("completed"))
        .all(&db)
        .await
        .unwrap()
        .iter()
        .map(|p| p.amount_cents)
        .sum();
    assert_eq!(ledger_total, 10_000);

    // neither writer clobbered the other's running total
    let stored = invoice::Entity::find_by_id(created.id)
        .one(&db)
        .await
        .unwrap()
        .expect("invoice missing");
    assert_eq!(stored.amount_paid_cents, ledger_total);
}

#[tokio::test]
async fn test_overdue_derived_in_listing() {
    let db = setup_test_db().await;
    let customer = create_test_customer(&db, "alice").await;

    let mut data = new_invoice(customer, vec![item("Widget", 1, dec!(10))]);
    data.due_date = Some("2020-01-01".to_string());
    invoice_service::create_invoice(&db, data).await.unwrap();

    let listed = invoice_service::list_invoices(
        &db,
        invoice_service::InvoiceFilter {
            payment_status: Some("overdue".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].payment_status, "overdue");
    assert_eq!(listed[0].customer_name.as_deref(), Some("alice"));
}
