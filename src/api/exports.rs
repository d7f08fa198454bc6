/// CSV and spreadsheet downloads for administrators
use crate::{
    auth::AdminUser,
    context::AppContext,
    error::UserMessage,
    exports::{active_members_csv, csv_filename, excel_filename, render_report, ExportField, FinancialReport},
    metrics,
};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/export_active_members", get(export_active_members))
        .route("/export_excel", get(export_excel))
}

#[derive(Debug, Deserialize)]
pub struct MembersExportQuery {
    /// Comma-separated field keys, all fields when absent
    pub fields: Option<String>,
    pub paid_only: Option<String>,
}

impl MembersExportQuery {
    pub fn paid_only(&self) -> bool {
        matches!(self.paid_only.as_deref(), Some("true") | Some("on") | Some("1"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub year: Option<i32>,
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response()
}

async fn export_active_members(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Query(query): Query<MembersExportQuery>,
) -> Result<Response, UserMessage> {
    let fields = ExportField::parse_list(query.fields.as_deref()).map_err(|e| e.at("/admin/members"))?;
    let members = ctx
        .members
        .list_active(query.paid_only())
        .await
        .map_err(|e| e.at("/admin/members"))?;

    let csv = active_members_csv(&members, &fields).map_err(|e| e.at("/admin/members"))?;
    metrics::record_export("csv");
    tracing::info!(rows = members.len(), paid_only = query.paid_only(), "Exported active members");

    Ok(attachment(
        "text/csv; charset=utf-8",
        &csv_filename(Utc::now().date_naive()),
        csv,
    ))
}

async fn export_excel(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, UserMessage> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let back = format!("/admin/ledger?year={}", year);

    let payments = ctx
        .fees
        .payments_in_calendar_year(year)
        .await
        .map_err(|e| e.at(back.clone()))?;
    let entries = ctx.ledger.list_for_year(year).await.map_err(|e| e.at(back.clone()))?;

    let report = FinancialReport::build(year, &payments, &entries);
    let html = render_report(&report, ctx.association_name());
    metrics::record_export("excel");

    Ok(attachment(
        "application/vnd.ms-excel",
        &excel_filename(year),
        html.into_bytes(),
    ))
}
