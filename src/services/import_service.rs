//! Bulk product import from CSV.
//!
//! Rows are processed strictly in file order against the live table, so a
//! product inserted mid-batch counts as an existing duplicate for later rows.
//! Every row ends up in the result ledger; only a malformed header aborts the
//! whole run. When an existing product is updated, only the columns the file
//! actually carries are overwritten; columns missing from the header keep
//! their stored values.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::domain::money::to_cents;
use crate::domain::ServiceError;
use crate::models::product;
use crate::services::asset_store::{AssetStore, DEFAULT_IMAGE};
use crate::services::product_service::{find_by_name, validate_product_fields};

const REQUIRED_COLUMNS: [&str; 3] = ["name", "price", "stock"];

static ALLOWED_COLUMNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "name",
        "description",
        "price",
        "old_price",
        "category",
        "stock",
        "featured",
        "image",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub update_existing: bool,
    #[serde(default)]
    pub skip_duplicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Inserted,
    Updated,
    SkippedDuplicate,
    RejectedValidation,
    RejectedDuplicate,
}

impl RowStatus {
    pub fn is_success(self) -> bool {
        matches!(self, RowStatus::Inserted | RowStatus::Updated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Inserted => "inserted",
            RowStatus::Updated => "updated",
            RowStatus::SkippedDuplicate => "skipped_duplicate",
            RowStatus::RejectedValidation => "rejected_validation",
            RowStatus::RejectedDuplicate => "rejected_duplicate",
        }
    }
}

/// One ledger line of the import report - the primary user-visible contract.
#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub row_number: u64,
    pub status: RowStatus,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub total_rows: usize,
    pub rows: Vec<RowResult>,
}

fn parse_decimal(raw: &str) -> Result<Option<Decimal>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .map(Some)
        .map_err(|_| format!("'{}' is not a valid number", raw))
}

fn parse_stock(raw: &str) -> Result<Option<i32>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i32>()
        .map(Some)
        .map_err(|_| format!("'{}' is not a valid integer", raw))
}

fn parse_featured(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "yes" | "true")
}

fn blank_to_none(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Resolve the image column to a stored filename.
///
/// A well-formed http(s) URL is fetched (30 s timeout, certificates verified)
/// and stored; any fetch or decode failure falls back silently. A bare
/// filename is reused only when it already exists in the asset directory.
async fn resolve_image(
    assets: &AssetStore,
    client: &reqwest::Client,
    raw: &str,
    fallback: &str,
) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return fallback.to_string();
    }

    if let Ok(parsed) = Url::parse(raw) {
        if parsed.scheme() == "http" || parsed.scheme() == "https" {
            match fetch_remote_image(client, raw).await {
                Some(bytes) => match assets.store(&bytes) {
                    Ok(filename) => return filename,
                    Err(e) => {
                        tracing::warn!(url = raw, "fetched image rejected: {}", e);
                        return fallback.to_string();
                    }
                },
                None => return fallback.to_string(),
            }
        }
    }

    if assets.exists(raw) {
        return raw.to_string();
    }

    fallback.to_string()
}

async fn fetch_remote_image(client: &reqwest::Client, url: &str) -> Option<Vec<u8>> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(url, "image fetch failed: {}", e);
            return None;
        }
    };
    if !response.status().is_success() {
        tracing::warn!(url, status = %response.status(), "image fetch returned an error status");
        return None;
    }
    match response.bytes().await {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(e) => {
            tracing::warn!(url, "image body read failed: {}", e);
            None
        }
    }
}

/// Run the import. Header-shape problems return an error before any row is
/// touched; everything after that lands in the per-row ledger.
pub async fn import_csv(
    db: &DatabaseConnection,
    assets: &AssetStore,
    bytes: &[u8],
    options: ImportOptions,
) -> Result<ImportReport, ServiceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ServiceError::Validation(format!("could not parse CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let unknown: Vec<&String> = headers
        .iter()
        .filter(|h| !ALLOWED_COLUMNS.contains(h.as_str()))
        .collect();
    if !unknown.is_empty() {
        return Err(ServiceError::Validation(format!(
            "unknown column(s): {}",
            unknown
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ServiceError::Storage(format!("http client init failed: {}", e)))?;

    let mut rows: Vec<RowResult> = Vec::new();
    let mut total_rows = 0usize;

    for (i, record) in rdr.records().enumerate() {
        // header is line 1; quoted fields may span lines, so the reader's
        // position is authoritative and the arithmetic is only a fallback
        let fallback_line = (i + 2) as u64;

        let record = match record {
            Ok(r) => r,
            Err(e) => {
                total_rows += 1;
                rows.push(RowResult {
                    row_number: e.position().map(|p| p.line()).unwrap_or(fallback_line),
                    status: RowStatus::RejectedValidation,
                    name: String::new(),
                    message: format!("could not parse row: {}", e),
                });
                continue;
            }
        };
        let row_number = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);

        // fully blank rows are skipped without counting
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        total_rows += 1;

        let field = |name: &str| -> &str {
            index
                .get(name)
                .and_then(|&i| record.get(i))
                .unwrap_or("")
                .trim()
        };
        let name = field("name").to_string();

        if record.len() != headers.len() {
            rows.push(RowResult {
                row_number,
                status: RowStatus::RejectedValidation,
                name,
                message: format!(
                    "expected {} columns, found {}",
                    headers.len(),
                    record.len()
                ),
            });
            continue;
        }

        let mut reasons = Vec::new();
        let mut price_parse_err = false;
        let mut stock_parse_err = false;

        let price = match parse_decimal(field("price")) {
            Ok(v) => v,
            Err(msg) => {
                reasons.push(format!("price {}", msg));
                price_parse_err = true;
                None
            }
        };
        let old_price = match parse_decimal(field("old_price")) {
            Ok(v) => v,
            Err(msg) => {
                reasons.push(format!("old_price {}", msg));
                None
            }
        };
        let stock = match parse_stock(field("stock")) {
            Ok(v) => v,
            Err(msg) => {
                reasons.push(format!("stock {}", msg));
                stock_parse_err = true;
                None
            }
        };
        let featured = parse_featured(field("featured"));
        let description = blank_to_none(field("description"));
        let category = blank_to_none(field("category"));

        let mut field_reasons = validate_product_fields(&name, price, old_price, stock);
        // a parse failure already reported these fields
        if price_parse_err {
            field_reasons.retain(|r| r != "price is required");
        }
        if stock_parse_err {
            field_reasons.retain(|r| r != "stock is required");
        }
        reasons.extend(field_reasons);

        if !reasons.is_empty() {
            rows.push(RowResult {
                row_number,
                status: RowStatus::RejectedValidation,
                name,
                message: reasons.join("; "),
            });
            continue;
        }

        // validated above
        let price = price.unwrap_or(Decimal::ONE);
        let stock = stock.unwrap_or(0);
        let now = chrono::Utc::now().to_rfc3339();

        match find_by_name(db, &name).await? {
            Some(existing) => {
                if options.skip_duplicates {
                    rows.push(RowResult {
                        row_number,
                        status: RowStatus::SkippedDuplicate,
                        name,
                        message: "product already exists, skipped".to_string(),
                    });
                    continue;
                }
                if !options.update_existing {
                    rows.push(RowResult {
                        row_number,
                        status: RowStatus::RejectedDuplicate,
                        name,
                        message: "product already exists".to_string(),
                    });
                    continue;
                }

                let image = resolve_image(assets, &client, field("image"), &existing.image).await;

                // only columns present in the header touch stored values;
                // a supplied blank still clears its field
                let mut active: product::ActiveModel = existing.into();
                if index.contains_key("description") {
                    active.description = Set(description);
                }
                active.price_cents = Set(to_cents(price));
                if index.contains_key("old_price") {
                    active.old_price_cents = Set(old_price.map(to_cents));
                }
                if index.contains_key("category") {
                    active.category = Set(category);
                }
                active.stock = Set(stock);
                if index.contains_key("featured") {
                    active.featured = Set(featured);
                }
                active.image = Set(image);
                active.updated_at = Set(now);
                active.update(db).await?;

                rows.push(RowResult {
                    row_number,
                    status: RowStatus::Updated,
                    name,
                    message: "product updated".to_string(),
                });
            }
            None => {
                let image = resolve_image(assets, &client, field("image"), DEFAULT_IMAGE).await;

                let model = product::ActiveModel {
                    name: Set(name.clone()),
                    description: Set(description),
                    price_cents: Set(to_cents(price)),
                    old_price_cents: Set(old_price.map(to_cents)),
                    category: Set(category),
                    stock: Set(stock),
                    featured: Set(featured),
                    image: Set(image),
                    created_at: Set(now.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(db).await?;

                rows.push(RowResult {
                    row_number,
                    status: RowStatus::Inserted,
                    name,
                    message: "product created".to_string(),
                });
            }
        }
    }

    let success_count = rows.iter().filter(|r| r.status.is_success()).count();
    let failed_count = rows.len() - success_count;

    tracing::info!(
        total = total_rows,
        success = success_count,
        failed = failed_count,
        "product import finished"
    );

    Ok(ImportReport {
        success_count,
        failed_count,
        total_rows,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn featured_coercion_is_case_insensitive() {
        assert!(parse_featured("1"));
        assert!(parse_featured("YES"));
        assert!(parse_featured("True"));
        assert!(!parse_featured("0"));
        assert!(!parse_featured("no"));
        assert!(!parse_featured(""));
        assert!(!parse_featured("y"));
    }

    #[test]
    fn blank_numeric_fields_become_none() {
        assert_eq!(parse_decimal("  "), Ok(None));
        assert_eq!(parse_decimal("9.99"), Ok(Some(dec!(9.99))));
        assert!(parse_decimal("abc").is_err());
        assert_eq!(parse_stock(""), Ok(None));
        assert_eq!(parse_stock("5"), Ok(Some(5)));
        assert!(parse_stock("5.5").is_err());
    }
}
