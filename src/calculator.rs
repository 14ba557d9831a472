use crate::error::Result;
use crate::models::PaymentType;
use crate::schema::{self, BEFORE_FEES_COMPONENTS};
use crate::table::{Cell, Row, Table};

/// Round to cents. Never returns negative zero.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn before_fees(row: Row<'_>) -> Result<f64> {
    let mut total = 0.0;
    for column in BEFORE_FEES_COMPONENTS {
        total += row.float(column)?;
    }
    Ok(total)
}

pub fn after_fees(row: Row<'_>) -> Result<f64> {
    let mut total = row.float(schema::TOTAL_BEFORE_FEES)?;
    for column in schema::fee_columns() {
        total += row.float(column)?;
    }
    Ok(total)
}

pub fn calculate_total_before_fees(table: &mut Table) -> Result<()> {
    table.derive_float(schema::TOTAL_BEFORE_FEES, |r| before_fees(r).map(round2))
}

pub fn calculate_total_after_fees(table: &mut Table) -> Result<()> {
    table.derive_float(schema::TOTAL_AFTER_FEES, |r| after_fees(r).map(round2))
}

pub fn calculate_payout(table: &mut Table) -> Result<()> {
    table.derive_float(schema::PAYOUT, |r| {
        Ok(round2(
            r.float(schema::TOTAL_AFTER_FEES)? - r.float(schema::TAX_WITHHELD)?,
        ))
    })
}

/// Cash was collected at the counter; nothing is disbursed for it.
pub fn zero_cash_payouts(table: &mut Table) -> Result<()> {
    table.derive(schema::PAYOUT, |r| {
        if r.text(schema::PAYMENT_TYPE)? == PaymentType::Cash.key() {
            Ok(Cell::Float(0.0))
        } else {
            r.get(schema::PAYOUT).cloned()
        }
    })
}
