/// Export formatters
///
/// `csv` renders the active-member list; `excel` renders the yearly
/// financial report as an HTML table that spreadsheet applications open as
/// a workbook.

pub mod csv;
pub mod excel;

pub use self::csv::{active_members_csv, csv_filename, ExportField};
pub use self::excel::{excel_filename, render_report, FinancialReport};
