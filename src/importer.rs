use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{Result, TallyError};
use crate::table::{Cell, Table};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a money amount as it appears in provider exports.
///
/// Blank cells, `-` and `nan` read as zero; `(x)` is negative. Returns `None`
/// for anything that is not a number so callers can fail loudly.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(&[',', '"', '$'][..], "");
    let s = s.trim();
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("nan") {
        return Some(0.0);
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// Two-digit years come first: `%Y` would happily read "23" as year 23.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%b %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%b %d, %Y"];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    base.checked_add_signed(chrono::Duration::seconds(seconds))
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Delimited exports (CSV, tab-separated TXT)
// ---------------------------------------------------------------------------

/// Read a delimited export. The first non-blank record is the header; short
/// rows are padded with nulls and blank lines are skipped. A row carrying
/// more values than the header has columns is an error.
pub fn read_delimited_from<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut table: Option<Table> = None;
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match table.as_mut() {
            None => {
                let header = record.iter().map(|f| f.trim().to_string()).collect();
                table = Some(Table::new(header));
            }
            Some(t) => {
                let width = t.columns().len();
                // trailing empty cells are tolerated, extra values are not
                let found = record
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| !f.trim().is_empty())
                    .last()
                    .map_or(0, |(i, _)| i + 1);
                if found > width {
                    return Err(TallyError::RowWidth {
                        expected: width,
                        found,
                    });
                }
                let mut row: Vec<Cell> = record
                    .iter()
                    .take(width)
                    .map(|f| {
                        if f.is_empty() {
                            Cell::Null
                        } else {
                            Cell::text(f)
                        }
                    })
                    .collect();
                row.resize(width, Cell::Null);
                t.push_row(row)?;
            }
        }
    }
    Ok(table.unwrap_or_default())
}

pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    read_delimited_from(std::io::BufReader::new(file), delimiter)
}

// ---------------------------------------------------------------------------
// XLSX exports (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
pub fn read_xlsx(path: &Path) -> Result<Table> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TallyError::Other(format!("No worksheets in {}", path.display())))??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let mut table = Table::new(
        header
            .iter()
            .map(|c| match c {
                Data::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
    );
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cells = row
            .iter()
            .map(|c| match c {
                Data::Empty | Data::Error(_) => Cell::Null,
                Data::String(s) => Cell::text(s.as_str()),
                Data::Float(f) => Cell::Float(*f),
                Data::Int(i) => Cell::Float(*i as f64),
                Data::Bool(b) => Cell::text(b.to_string()),
                Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
                    .map(Cell::Timestamp)
                    .unwrap_or(Cell::Null),
                Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
            })
            .collect();
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Load a raw export, choosing the reader from the file extension.
pub fn load_raw(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_delimited(path, b','),
        "txt" | "tsv" => read_delimited(path, b'\t'),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xls" => read_xlsx(path),
        _ => Err(TallyError::Other(format!(
            "Unsupported export format: {}",
            path.display()
        ))),
    }
}
