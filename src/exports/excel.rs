/// Yearly financial report in spreadsheet-compatible HTML
use crate::{
    db::models::{format_cents, LedgerEntry, LedgerKind},
    fees::PaymentRow,
    views::escape,
};
use chrono::NaiveDate;
use std::fmt::Write;

/// UTF-8 byte order mark; spreadsheet applications need it to pick UTF-8
const BOM: &str = "\u{FEFF}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub kind: LedgerKind,
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
}

/// Income and expense rows of one calendar year with totals
#[derive(Debug, Clone)]
pub struct FinancialReport {
    pub year: i32,
    pub rows: Vec<ReportRow>,
    pub total_income: i64,
    pub total_expense: i64,
}

impl FinancialReport {
    /// Fee payments count as income next to the ledger entries
    pub fn build(year: i32, payments: &[PaymentRow], entries: &[LedgerEntry]) -> Self {
        let mut rows: Vec<ReportRow> = payments
            .iter()
            .map(|p| ReportRow {
                date: p.paid_date,
                kind: LedgerKind::Income,
                description: format!("Membership fee {} - {}", p.social_year_name, p.member_name),
                category: "Membership fees".to_string(),
                amount_cents: p.amount_cents,
            })
            .chain(entries.iter().map(|e| ReportRow {
                date: e.entry_date,
                kind: e.kind,
                description: e.description.clone(),
                category: e.category.clone().unwrap_or_default(),
                amount_cents: e.amount_cents,
            }))
            .collect();
        rows.sort_by_key(|r| r.date);

        let total = |kind: LedgerKind| -> i64 {
            rows.iter().filter(|r| r.kind == kind).map(|r| r.amount_cents).sum()
        };
        let total_income = total(LedgerKind::Income);
        let total_expense = total(LedgerKind::Expense);

        Self {
            year,
            rows,
            total_income,
            total_expense,
        }
    }

    pub fn balance(&self) -> i64 {
        self.total_income - self.total_expense
    }
}

/// Render the report as an HTML table prefixed with a BOM
pub fn render_report(report: &FinancialReport, association: &str) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(BOM);
    out.push_str("<html><head><meta charset=\"utf-8\"><style>");
    out.push_str(".income td { background-color: #d4edda; } ");
    out.push_str(".expense td { background-color: #f8d7da; } ");
    out.push_str(".total td { font-weight: bold; }");
    out.push_str("</style></head><body>");

    let _ = write!(
        out,
        "<h3>{} - Financial report {}</h3>",
        escape(association),
        report.year
    );
    out.push_str("<table border=\"1\"><thead><tr>");
    out.push_str("<th>Date</th><th>Type</th><th>Description</th><th>Category</th><th>Amount</th>");
    out.push_str("</tr></thead><tbody>");

    for row in &report.rows {
        let (class, label) = match row.kind {
            LedgerKind::Income => ("income", "Income"),
            LedgerKind::Expense => ("expense", "Expense"),
        };
        let _ = write!(
            out,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            class,
            row.date.format("%Y-%m-%d"),
            label,
            escape(&row.description),
            escape(&row.category),
            format_cents(row.amount_cents)
        );
    }

    for (label, cents) in [
        ("Total income", report.total_income),
        ("Total expense", report.total_expense),
        ("Balance", report.balance()),
    ] {
        let _ = write!(
            out,
            "<tr class=\"total\"><td colspan=\"4\">{}</td><td>{}</td></tr>",
            label,
            format_cents(cents)
        );
    }

    out.push_str("</tbody></table></body></html>");
    out
}

pub fn excel_filename(year: i32) -> String {
    format!("report_{}.xls", year)
}
