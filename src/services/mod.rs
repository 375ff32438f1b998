pub mod asset_store;
pub mod import_service;
pub mod invoice_service;
pub mod order_service;
pub mod product_service;
pub mod report_service;
pub mod user_service;
