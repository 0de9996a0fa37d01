//!
//! Spreadsheet rendering
//!
use super::{rows, Cell, COLUMNS};
use crate::aggregate::Aggregate;
use crate::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};

/// Worksheet holding the report
pub const WORKSHEET_NAME: &str = "App Report Metrics";

// Workbooks otherwise carry the wall-clock creation time
#[allow(clippy::cast_possible_truncation)]
fn creation_datetime(generated_at: &NaiveDateTime) -> Result<ExcelDateTime> {
    let year = u16::try_from(generated_at.year()).unwrap_or(0);
    Ok(ExcelDateTime::from_ymd(year, generated_at.month() as u8, generated_at.day() as u8)?
        .and_hms(
            generated_at.hour() as u16,
            generated_at.minute() as u8,
            generated_at.second(),
        )?)
}

/// Encode the aggregate as an xlsx workbook: a header row, then one row per record.
/// The workbook is stamped with `generated_at`, so equal inputs give equal bytes.
pub fn render(aggregate: &Aggregate, generated_at: &NaiveDateTime) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let created = creation_datetime(generated_at)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let decimal = Format::new().set_num_format("0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(WORKSHEET_NAME)?;

    for (col, header) in (0u16..).zip(COLUMNS) {
        worksheet.write_string(0, col, header)?;
    }

    for (row, cells) in (1u32..).zip(rows(aggregate)) {
        for (col, cell) in (0u16..).zip(cells) {
            match cell {
                Cell::Text(text) => {
                    worksheet.write_string(row, col, text.as_str())?;
                }
                #[allow(clippy::cast_precision_loss)]
                Cell::Integer(n) => {
                    worksheet.write_number(row, col, n as f64)?;
                }
                Cell::Decimal(n) => {
                    worksheet.write_number_with_format(row, col, n, &decimal)?;
                }
                Cell::Empty => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
