//! Product catalog - CRUD and the validation rules shared with the CSV
//! importer, so the form path and the bulk path cannot drift apart.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::domain::money::to_cents;
use crate::domain::ServiceError;
use crate::models::product::{self, Entity as Product, ProductDto};
use crate::services::asset_store::{AssetStore, DEFAULT_IMAGE};

pub const MAX_NAME_LEN: usize = 255;

/// Row-level validation; returns every failing reason so the caller can
/// report them all at once.
pub fn validate_product_fields(
    name: &str,
    price: Option<Decimal>,
    old_price: Option<Decimal>,
    stock: Option<i32>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if name.trim().is_empty() {
        reasons.push("product name is required".to_string());
    } else if name.chars().count() > MAX_NAME_LEN {
        reasons.push(format!("product name must be at most {} characters", MAX_NAME_LEN));
    }

    match price {
        None => reasons.push("price is required".to_string()),
        Some(p) if p <= Decimal::ZERO => {
            reasons.push("price must be greater than zero".to_string())
        }
        _ => {}
    }

    match stock {
        None => reasons.push("stock is required".to_string()),
        Some(s) if s < 0 => reasons.push("stock must not be negative".to_string()),
        _ => {}
    }

    if let Some(op) = old_price {
        if op <= Decimal::ZERO {
            reasons.push("old price must be greater than zero".to_string());
        } else if let Some(p) = price {
            if op <= p {
                reasons.push("old price must be greater than current price".to_string());
            }
        }
    }

    reasons
}

/// Filter parameters for listing products
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

pub async fn list_products(
    db: &DatabaseConnection,
    filter: ProductFilter,
) -> Result<(Vec<ProductDto>, u64), ServiceError> {
    let mut condition = Condition::all();

    if let Some(category) = filter.category {
        condition = condition.add(product::Column::Category.eq(category));
    }
    if let Some(featured) = filter.featured {
        condition = condition.add(product::Column::Featured.eq(featured));
    }
    if let Some(search) = filter.search {
        if !search.is_empty() {
            condition = condition.add(product::Column::Name.contains(&search));
        }
    }

    let per_page = filter.per_page.clamp(1, 200);
    let page = filter.page.max(1);

    let paginator = Product::find()
        .filter(condition)
        .order_by_asc(product::Column::Name)
        .paginate(db, per_page);

    let total = paginator.num_items().await?;
    let products = paginator.fetch_page(page - 1).await?;

    Ok((products.into_iter().map(ProductDto::from).collect(), total))
}

pub async fn get_product(db: &DatabaseConnection, id: i32) -> Result<ProductDto, ServiceError> {
    let model = Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    Ok(ProductDto::from(model))
}

/// Exact name match - intentionally no case or whitespace normalization,
/// mirroring how the bulk importer detects duplicates.
pub async fn find_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<product::Model>, ServiceError> {
    Ok(Product::find()
        .filter(product::Column::Name.eq(name))
        .one(db)
        .await?)
}

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub category: Option<String>,
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
    pub image: Option<String>,
}

pub async fn create_product(
    db: &DatabaseConnection,
    input: ProductInput,
) -> Result<ProductDto, ServiceError> {
    let reasons = validate_product_fields(
        &input.name,
        Some(input.price),
        input.old_price,
        Some(input.stock),
    );
    if !reasons.is_empty() {
        return Err(ServiceError::Validation(reasons.join("; ")));
    }

    if find_by_name(db, &input.name).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "a product named '{}' already exists",
            input.name
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let model = product::ActiveModel {
        name: Set(input.name),
        description: Set(input.description),
        price_cents: Set(to_cents(input.price)),
        old_price_cents: Set(input.old_price.map(to_cents)),
        category: Set(input.category),
        stock: Set(input.stock),
        featured: Set(input.featured),
        image: Set(input.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string())),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(ProductDto::from(model.insert(db).await?))
}

pub async fn update_product(
    db: &DatabaseConnection,
    id: i32,
    input: ProductInput,
) -> Result<ProductDto, ServiceError> {
    let reasons = validate_product_fields(
        &input.name,
        Some(input.price),
        input.old_price,
        Some(input.stock),
    );
    if !reasons.is_empty() {
        return Err(ServiceError::Validation(reasons.join("; ")));
    }

    let existing = Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    // Renaming onto another product's name is a conflict
    if existing.name != input.name {
        if let Some(other) = find_by_name(db, &input.name).await? {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "a product named '{}' already exists",
                    input.name
                )));
            }
        }
    }

    let keep_image = existing.image.clone();
    let mut active: product::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.description = Set(input.description);
    active.price_cents = Set(to_cents(input.price));
    active.old_price_cents = Set(input.old_price.map(to_cents));
    active.category = Set(input.category);
    active.stock = Set(input.stock);
    active.featured = Set(input.featured);
    active.image = Set(input.image.unwrap_or(keep_image));
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(ProductDto::from(active.update(db).await?))
}

/// Delete the row and its image file (the shared default image survives).
pub async fn delete_product(
    db: &DatabaseConnection,
    assets: &AssetStore,
    id: i32,
) -> Result<(), ServiceError> {
    let existing = Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let image = existing.image.clone();
    Product::delete_by_id(id).exec(db).await?;

    if let Err(e) = assets.delete(&image) {
        tracing::warn!(product_id = id, "failed to delete product image: {}", e);
    }

    Ok(())
}

/// Attach an uploaded image to a product, replacing the previous file.
pub async fn set_product_image(
    db: &DatabaseConnection,
    assets: &AssetStore,
    id: i32,
    bytes: &[u8],
) -> Result<ProductDto, ServiceError> {
    let existing = Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let filename = assets.store(bytes)?;
    let old_image = existing.image.clone();

    let mut active: product::ActiveModel = existing.into();
    active.image = Set(filename);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    let saved = active.update(db).await?;

    if old_image != DEFAULT_IMAGE {
        let _ = assets.delete(&old_image);
    }

    Ok(ProductDto::from(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn accumulates_all_failing_reasons() {
        let reasons = validate_product_fields("", None, Some(dec!(-1)), Some(-2));
        assert_eq!(reasons.len(), 4);
    }

    #[test]
    fn old_price_must_exceed_price() {
        let reasons =
            validate_product_fields("Widget", Some(dec!(10)), Some(dec!(5)), Some(0));
        assert_eq!(
            reasons,
            vec!["old price must be greater than current price".to_string()]
        );
        assert!(
            validate_product_fields("Widget", Some(dec!(10)), Some(dec!(12)), Some(0)).is_empty()
        );
    }

    #[test]
    fn name_length_limit() {
        let long_name = "x".repeat(256);
        let reasons = validate_product_fields(&long_name, Some(dec!(1)), None, Some(0));
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("255"));
    }
}
