use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopadmin::db;
use shopadmin::domain::ServiceError;
use shopadmin::models::product;
use shopadmin::services::asset_store::{AssetStore, DEFAULT_IMAGE};
use shopadmin::services::import_service::{self, ImportOptions, RowStatus};

// Magic bytes are enough for format sniffing
const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n00000000";

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn test_assets() -> (tempfile::TempDir, AssetStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = AssetStore::new(dir.path()).expect("Failed to init asset store");
    (dir, store)
}

async fn run_import(
    db: &DatabaseConnection,
    assets: &AssetStore,
    csv: &str,
    options: ImportOptions,
) -> Result<import_service::ImportReport, ServiceError> {
    import_service::import_csv(db, assets, csv.as_bytes(), options).await
}

async fn product_by_name(db: &DatabaseConnection, name: &str) -> Option<product::Model> {
    product::Entity::find()
        .filter(product::Column::Name.eq(name))
        .one(db)
        .await
        .expect("query failed")
}

#[tokio::test]
async fn test_simple_insert() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let report = run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,9.99,5\n",
        ImportOptions::default(),
    )
    .await
    .expect("Import failed");

    assert_eq!(report.total_rows, 1);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.rows[0].status, RowStatus::Inserted);
    assert_eq!(report.rows[0].row_number, 2);

    let saved = product_by_name(&db, "Widget").await.expect("missing product");
    assert_eq!(saved.price_cents, 999);
    assert_eq!(saved.stock, 5);
    assert_eq!(saved.image, DEFAULT_IMAGE);
}

#[tokio::test]
async fn test_unknown_column_aborts_whole_file() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let result = run_import(
        &db,
        &assets,
        "name,price,stock,colour\nWidget,9.99,5,red\n",
        ImportOptions::default(),
    )
    .await;

    match result {
        Err(ServiceError::Validation(msg)) => assert!(msg.contains("colour"), "{}", msg),
        other => panic!("expected validation error, got {:?}", other.map(|r| r.total_rows)),
    }

    let count = product::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_missing_required_column_aborts() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let result = run_import(
        &db,
        &assets,
        "name,price\nWidget,9.99\n",
        ImportOptions::default(),
    )
    .await;

    match result {
        Err(ServiceError::Validation(msg)) => assert!(msg.contains("stock"), "{}", msg),
        other => panic!("expected validation error, got {:?}", other.map(|r| r.total_rows)),
    }
}

#[tokio::test]
async fn test_row_validation_failures_are_reported_together() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let csv = "name,price,old_price,stock\n\
               Discounted,10.00,5.00,3\n\
               ,abc,,xyz\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .expect("Import failed");

    assert_eq!(report.total_rows, 2);
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failed_count, 2);

    assert_eq!(report.rows[0].status, RowStatus::RejectedValidation);
    assert!(report.rows[0]
        .message
        .contains("old price must be greater than current price"));

    // bad name, bad price and bad stock all surface on the same ledger line
    assert_eq!(report.rows[1].status, RowStatus::RejectedValidation);
    assert!(report.rows[1].message.contains("name"));
    assert!(report.rows[1].message.contains("price"));
    assert!(report.rows[1].message.contains("stock"));
}

#[tokio::test]
async fn test_duplicate_handling_modes() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,9.99,5\n",
        ImportOptions::default(),
    )
    .await
    .unwrap();

    // default: duplicate is an error row
    let rejected = run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,19.99,9\n",
        ImportOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(rejected.rows[0].status, RowStatus::RejectedDuplicate);
    assert_eq!(rejected.success_count, 0);

    // skip_duplicates: counted but not a success
    let skipped = run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,19.99,9\n",
        ImportOptions {
            skip_duplicates: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(skipped.rows[0].status, RowStatus::SkippedDuplicate);
    assert_eq!(skipped.success_count, 0);
    assert_eq!(product_by_name(&db, "Widget").await.unwrap().price_cents, 999);

    // update_existing: the row overwrites
    let updated = run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,19.99,9\n",
        ImportOptions {
            update_existing: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.rows[0].status, RowStatus::Updated);
    assert_eq!(updated.success_count, 1);
    let saved = product_by_name(&db, "Widget").await.unwrap();
    assert_eq!(saved.price_cents, 1999);
    assert_eq!(saved.stock, 9);
}

#[tokio::test]
async fn test_duplicate_within_the_same_file() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let csv = "name,price,stock\nWidget,9.99,5\nWidget,8.99,2\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.rows[0].status, RowStatus::Inserted);
    assert_eq!(report.rows[1].status, RowStatus::RejectedDuplicate);
    assert_eq!(product::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_blank_rows_are_not_counted() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let csv = "name,price,stock\nWidget,9.99,5\n,,\nGadget,1.50,0\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_rows, 2);
    assert_eq!(report.success_count, 2);
    // row numbers still reflect the file position
    assert_eq!(report.rows[1].row_number, 4);
}

#[tokio::test]
async fn test_column_count_mismatch_is_a_row_error() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let csv = "name,price,stock\nWidget,9.99\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_rows, 1);
    assert_eq!(report.rows[0].status, RowStatus::RejectedValidation);
    assert!(report.rows[0].message.contains("columns"));
}

#[tokio::test]
async fn test_row_numbers_follow_quoted_multiline_fields() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    // the first record's quoted description spans two physical lines,
    // so the second record starts on line 4
    let csv = "name,price,stock,description\n\
               Widget,9.99,5,\"spans\ntwo lines\"\n\
               Gadget,1.50,0,plain\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .expect("Import failed");

    assert_eq!(report.total_rows, 2);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.rows[0].row_number, 2);
    assert_eq!(report.rows[1].row_number, 4);

    let saved = product_by_name(&db, "Widget").await.expect("missing product");
    assert_eq!(saved.description.as_deref(), Some("spans\ntwo lines"));
}

#[tokio::test]
async fn test_update_preserves_columns_absent_from_header() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    run_import(
        &db,
        &assets,
        "name,price,stock,description,category,featured\nWidget,9.99,5,Handy,Tools,yes\n",
        ImportOptions::default(),
    )
    .await
    .unwrap();

    // a price/stock refresh file must not wipe the columns it does not carry
    let report = run_import(
        &db,
        &assets,
        "name,price,stock\nWidget,19.99,9\n",
        ImportOptions {
            update_existing: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(report.rows[0].status, RowStatus::Updated);

    let saved = product_by_name(&db, "Widget").await.unwrap();
    assert_eq!(saved.price_cents, 1999);
    assert_eq!(saved.stock, 9);
    assert_eq!(saved.description.as_deref(), Some("Handy"));
    assert_eq!(saved.category.as_deref(), Some("Tools"));
    assert!(saved.featured);
}

#[tokio::test]
async fn test_remote_image_is_fetched_and_stored() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widget.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_HEADER))
        .mount(&server)
        .await;

    let csv = format!(
        "name,price,stock,image\nWidget,9.99,5,{}/widget.png\n",
        server.uri()
    );
    let report = run_import(&db, &assets, &csv, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(report.success_count, 1);

    let saved = product_by_name(&db, "Widget").await.unwrap();
    assert_ne!(saved.image, DEFAULT_IMAGE);
    assert!(saved.image.ends_with(".png"));
    assert!(assets.exists(&saved.image));
}

#[tokio::test]
async fn test_failed_image_fetch_falls_back_to_default() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let csv = format!(
        "name,price,stock,image\nWidget,9.99,5,{}/missing.png\n",
        server.uri()
    );
    let report = run_import(&db, &assets, &csv, ImportOptions::default())
        .await
        .unwrap();

    // the row still imports; only the image falls back
    assert_eq!(report.success_count, 1);
    assert_eq!(product_by_name(&db, "Widget").await.unwrap().image, DEFAULT_IMAGE);
}

#[tokio::test]
async fn test_featured_flag_coercion() {
    let db = setup_test_db().await;
    let (_dir, assets) = test_assets();

    let csv = "name,price,stock,featured\nA,1.00,1,yes\nB,1.00,1,0\nC,1.00,1,maybe\n";
    let report = run_import(&db, &assets, csv, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(report.success_count, 3);

    assert!(product_by_name(&db, "A").await.unwrap().featured);
    assert!(!product_by_name(&db, "B").await.unwrap().featured);
    assert!(!product_by_name(&db, "C").await.unwrap().featured);
}
