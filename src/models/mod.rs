pub mod invoice;
pub mod invoice_item;
pub mod invoice_payment;
pub mod order;
pub mod order_item;
pub mod product;
pub mod refund;
pub mod shop_settings;
pub mod user;

pub use invoice::InvoiceDto;
pub use product::ProductDto;
pub use shop_settings::ShopSettingsDto;
pub use user::UserDto;
