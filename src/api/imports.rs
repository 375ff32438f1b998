use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};

use crate::api::error_response;
use crate::db::AppState;
use crate::domain::ServiceError;
use crate::services::import_service::{self, ImportOptions, ImportReport};

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "yes" | "true")
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The import answers with a self-contained report page rather than JSON;
/// the admin UI opens it directly after the upload form submit.
fn render_report(report: &ImportReport) -> String {
    let mut rows = String::new();
    for row in &report.rows {
        let class = if row.status.is_success() { "ok" } else { "fail" };
        rows.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            class,
            row.row_number,
            html_escape(&row.name),
            row.status.as_str(),
            html_escape(&row.message),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Product import report</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 0.4em 0.8em; text-align: left; }}
tr.ok td {{ background: #eaf7ea; }}
tr.fail td {{ background: #fbeaea; }}
</style>
</head>
<body>
<h1>Product import report</h1>
<p>{} imported, {} failed or skipped, {} rows total.</p>
<table>
<tr><th>Row</th><th>Name</th><th>Status</th><th>Message</th></tr>
{}</table>
</body>
</html>
"#,
        report.success_count, report.failed_count, report.total_rows, rows
    )
}

/// POST /api/products/import - multipart CSV upload.
///
/// Fields: "file" (the CSV), optional "update_existing" and "skip_duplicates"
/// flags. Header-shape problems come back as a JSON 400 before any row is
/// written; a processed run answers with the HTML report page.
pub async fn import_products(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut csv_bytes: Option<Vec<u8>> = None;
    let mut options = ImportOptions::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "csv" => match field.bytes().await {
                Ok(data) => csv_bytes = Some(data.to_vec()),
                Err(e) => {
                    return error_response(ServiceError::Validation(format!(
                        "could not read upload: {}",
                        e
                    )))
                }
            },
            "update_existing" => {
                if let Ok(value) = field.text().await {
                    options.update_existing = truthy(&value);
                }
            }
            "skip_duplicates" => {
                if let Ok(value) = field.text().await {
                    options.skip_duplicates = truthy(&value);
                }
            }
            _ => {}
        }
    }

    let Some(csv_bytes) = csv_bytes else {
        return error_response(ServiceError::Validation(
            "multipart field 'file' is required".to_string(),
        ));
    };

    match import_service::import_csv(&state.conn, &state.assets, &csv_bytes, options).await {
        Ok(report) => (StatusCode::OK, Html(render_report(&report))).into_response(),
        Err(e) => error_response(e),
    }
}
