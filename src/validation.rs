use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::calculator::{after_fees, before_fees};
use crate::error::TallyError;
use crate::importer::{load_raw, parse_timestamp};
use crate::models::PaymentType;
use crate::schema;
use crate::table::{Cell, Row, Table};

/// Absolute tolerance for numeric invariants.
pub const TOLERANCE: f64 = 0.05;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("expected {expected} file(s), found {found}")]
    FileCount { expected: usize, found: usize },

    #[error("{} does not exist or is not a .{expected} file", path.display())]
    FileExtension { path: PathBuf, expected: String },

    #[error("{}: could not read: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("{}: row {row} has unparseable date {value:?} in `{column}`", path.display())]
    UnparseableDate {
        path: PathBuf,
        column: String,
        row: usize,
        value: String,
    },

    #[error("{}: row {row} date {date} is outside {start}..={end}", path.display())]
    DateOutOfRange {
        path: PathBuf,
        row: usize,
        date: NaiveDateTime,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("column set mismatch: missing {missing:?}, unexpected {unexpected:?}, found {found:?}")]
    ColumnMismatch {
        found: Vec<String>,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("row {row}: `{column}` holds {value:?}, not a valid value")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("row {row}: fee column `{column}` is positive ({value})")]
    PositiveFee { column: String, row: usize, value: f64 },

    #[error("canonical table has {canonical} rows, processed table has {processed}")]
    RecordCount { canonical: usize, processed: usize },

    #[error("row {row}: total_before_fees is {found}, components sum to {expected}")]
    TotalBeforeFees { row: usize, expected: f64, found: f64 },

    #[error("row {row}: total_after_fees is {found}, expected {expected}")]
    TotalAfterFees { row: usize, expected: f64, found: f64 },

    #[error("row {row}: {payment_type} payout is {found}, expected {expected}")]
    Payout {
        row: usize,
        payment_type: String,
        expected: f64,
        found: f64,
    },

    #[error("{rows} processed rows for {groups} distinct `{key}` values")]
    GroupingCardinality {
        key: String,
        groups: usize,
        rows: usize,
    },
}

impl ValidationError {
    /// Name of the check that produced this failure.
    pub fn check(&self) -> &'static str {
        match self {
            Self::FileCount { .. } => "file_count",
            Self::FileExtension { .. } => "file_extension",
            Self::Unreadable { .. } | Self::UnparseableDate { .. } | Self::DateOutOfRange { .. } => {
                "date_range"
            }
            Self::ColumnMismatch { .. } | Self::PositiveFee { .. } => "columns_match",
            Self::MissingColumn(_) | Self::InvalidValue { .. } => "table_shape",
            Self::RecordCount { .. } => "record_count_match",
            Self::TotalBeforeFees { .. } => "total_before_fees_accurate",
            Self::TotalAfterFees { .. } => "total_after_fees_accurate",
            Self::Payout { .. } => "payout_matches_after_fees",
            Self::GroupingCardinality { .. } => "grouping_cardinality_match",
        }
    }
}

pub type CheckResult = std::result::Result<(), ValidationError>;

fn shape(err: TallyError) -> ValidationError {
    match err {
        TallyError::MissingColumn { column, .. } => ValidationError::MissingColumn(column),
        TallyError::InvalidNumber { column, row, value }
        | TallyError::InvalidTimestamp { column, row, value } => {
            ValidationError::InvalidValue { column, row, value }
        }
        other => ValidationError::InvalidValue {
            column: String::new(),
            row: 0,
            value: other.to_string(),
        },
    }
}

fn float(row: Row<'_>, column: &str) -> std::result::Result<f64, ValidationError> {
    row.float(column).map_err(shape)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE
}

// ---------------------------------------------------------------------------
// File checks
// ---------------------------------------------------------------------------

pub fn file_count<P: AsRef<Path>>(files: &[P], expected: usize) -> CheckResult {
    if files.len() != expected {
        return Err(ValidationError::FileCount {
            expected,
            found: files.len(),
        });
    }
    Ok(())
}

pub fn file_extension<P: AsRef<Path>>(files: &[P], ext: &str) -> CheckResult {
    let wanted = ext.trim_start_matches('.');
    for file in files {
        let path = file.as_ref();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if !path.is_file() || !matches {
            return Err(ValidationError::FileExtension {
                path: path.to_path_buf(),
                expected: wanted.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_with(value: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    match format {
        Some(fmt) => NaiveDateTime::parse_from_str(value.trim(), fmt)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value.trim(), fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
        None => parse_timestamp(value),
    }
}

/// Every date in `date_column` of every file falls in `[start 00:00:00,
/// end 23:59:59]`. Without a `date_format` the usual export layouts are
/// tried.
pub fn date_range<P: AsRef<Path>>(
    files: &[P],
    start: NaiveDate,
    end: NaiveDate,
    date_column: &str,
    date_format: Option<&str>,
) -> CheckResult {
    let lower = start.and_hms_opt(0, 0, 0);
    let upper = end.and_hms_opt(23, 59, 59);
    for file in files {
        let path = file.as_ref();
        let table = load_raw(path).map_err(|e| ValidationError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let idx = table
            .column_index(date_column)
            .ok_or_else(|| ValidationError::MissingColumn(date_column.to_string()))?;
        for (row, cells) in table.rows().iter().enumerate() {
            let date = match &cells[idx] {
                Cell::Timestamp(t) => Some(*t),
                other => parse_with(&other.render(), date_format),
            };
            let Some(date) = date else {
                return Err(ValidationError::UnparseableDate {
                    path: path.to_path_buf(),
                    column: date_column.to_string(),
                    row,
                    value: cells[idx].render(),
                });
            };
            let inside = lower.is_some_and(|l| date >= l) && upper.is_some_and(|u| date <= u);
            if !inside {
                return Err(ValidationError::DateOutOfRange {
                    path: path.to_path_buf(),
                    row,
                    date,
                    start,
                    end,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Table checks
// ---------------------------------------------------------------------------

/// Columns equal the schema in declared order, and no fee is positive.
pub fn columns_match(canonical: &Table) -> CheckResult {
    let expected = schema::columns();
    if canonical.columns() != expected.as_slice() {
        let found: Vec<String> = canonical.columns().to_vec();
        let missing = expected
            .iter()
            .filter(|c| !canonical.has_column(c))
            .map(|c| c.to_string())
            .collect();
        let unexpected = found
            .iter()
            .filter(|c| !schema::is_canonical(c))
            .cloned()
            .collect();
        return Err(ValidationError::ColumnMismatch {
            found,
            missing,
            unexpected,
        });
    }
    for row in canonical.iter_rows() {
        for column in schema::fee_columns() {
            let value = float(row, column)?;
            if value > 0.0 {
                return Err(ValidationError::PositiveFee {
                    column: column.to_string(),
                    row: row.index(),
                    value,
                });
            }
        }
    }
    Ok(())
}

pub fn record_count_match(canonical: &Table, processed: &Table) -> CheckResult {
    if canonical.len() != processed.len() {
        return Err(ValidationError::RecordCount {
            canonical: canonical.len(),
            processed: processed.len(),
        });
    }
    Ok(())
}

pub fn total_before_fees_accurate(canonical: &Table) -> CheckResult {
    for row in canonical.iter_rows() {
        let expected = before_fees(row).map_err(shape)?;
        let found = float(row, schema::TOTAL_BEFORE_FEES)?;
        if !close(expected, found) {
            return Err(ValidationError::TotalBeforeFees {
                row: row.index(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

pub fn total_after_fees_accurate(canonical: &Table) -> CheckResult {
    for row in canonical.iter_rows() {
        let expected = after_fees(row).map_err(shape)?;
        let found = float(row, schema::TOTAL_AFTER_FEES)?;
        if !close(expected, found) {
            return Err(ValidationError::TotalAfterFees {
                row: row.index(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// Cash rows pay out nothing. Credit rows pay out the after-fees total,
/// or that total less tax the provider withheld.
pub fn payout_matches_after_fees(canonical: &Table) -> CheckResult {
    for row in canonical.iter_rows() {
        let payment_type = row.text(schema::PAYMENT_TYPE).map_err(shape)?;
        let found = float(row, schema::PAYOUT)?;
        let after = float(row, schema::TOTAL_AFTER_FEES)?;
        if payment_type == PaymentType::Cash.key() {
            if !close(found, 0.0) {
                return Err(ValidationError::Payout {
                    row: row.index(),
                    payment_type,
                    expected: 0.0,
                    found,
                });
            }
        } else if payment_type == PaymentType::Credit.key() {
            let withheld = float(row, schema::TAX_WITHHELD)?;
            if !close(found, after) && !close(found, after - withheld) {
                return Err(ValidationError::Payout {
                    row: row.index(),
                    payment_type,
                    expected: after,
                    found,
                });
            }
        } else {
            return Err(ValidationError::InvalidValue {
                column: schema::PAYMENT_TYPE.to_string(),
                row: row.index(),
                value: payment_type,
            });
        }
    }
    Ok(())
}

/// After an aggregation step, one processed row exists per distinct key.
pub fn grouping_cardinality_match(raw: &Table, processed: &Table, key: &str) -> CheckResult {
    let mut keys = HashSet::new();
    for row in raw.iter_rows() {
        keys.insert(row.text(key).map_err(shape)?.trim().to_string());
    }
    if keys.len() != processed.len() {
        return Err(ValidationError::GroupingCardinality {
            key: key.to_string(),
            groups: keys.len(),
            rows: processed.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Composites
// ---------------------------------------------------------------------------

/// The table checks a provider can be held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    ColumnsMatch,
    RecordCountMatch,
    TotalBeforeFeesAccurate,
    TotalAfterFeesAccurate,
    PayoutMatchesAfterFees,
}

impl Check {
    pub const ALL: &'static [Check] = &[
        Check::ColumnsMatch,
        Check::RecordCountMatch,
        Check::TotalBeforeFeesAccurate,
        Check::TotalAfterFeesAccurate,
        Check::PayoutMatchesAfterFees,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ColumnsMatch => "columns_match",
            Self::RecordCountMatch => "record_count_match",
            Self::TotalBeforeFeesAccurate => "total_before_fees_accurate",
            Self::TotalAfterFeesAccurate => "total_after_fees_accurate",
            Self::PayoutMatchesAfterFees => "payout_matches_after_fees",
        }
    }

    pub fn run(&self, canonical: &Table, processed: &Table) -> CheckResult {
        match self {
            Self::ColumnsMatch => columns_match(canonical),
            Self::RecordCountMatch => record_count_match(canonical, processed),
            Self::TotalBeforeFeesAccurate => total_before_fees_accurate(canonical),
            Self::TotalAfterFeesAccurate => total_after_fees_accurate(canonical),
            Self::PayoutMatchesAfterFees => payout_matches_after_fees(canonical),
        }
    }
}

/// Run `checks` in order, stopping at the first failure.
pub fn run_checks(checks: &[Check], canonical: &Table, processed: &Table) -> CheckResult {
    for check in checks {
        check.run(canonical, processed)?;
    }
    Ok(())
}

pub fn all_checks(canonical: &Table, processed: &Table) -> CheckResult {
    run_checks(Check::ALL, canonical, processed)
}

/// Read a canonical CSV back, typing each column by the schema.
pub fn read_canonical(path: &Path) -> crate::error::Result<Table> {
    let mut table = load_raw(path)?;
    for column in schema::columns() {
        if !table.has_column(column) {
            continue;
        }
        match schema::type_of(column) {
            Some(schema::ColumnType::Float) => {
                table.derive(column, |r| r.float(column).map(Cell::Float))?
            }
            Some(schema::ColumnType::Timestamp) => {
                table.derive(column, |r| r.timestamp(column).map(Cell::Timestamp))?
            }
            _ => {}
        }
    }
    Ok(table)
}
