use crate::calculator::{self, round2};
use crate::error::Result;
use crate::models::PaymentType;
use crate::normalizer;
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["Order #", "Delivery Date", "Food Total", "Check Date"];

const LOCATION: &str = "Location";
const CHECK_DATE: &str = "check_date";

const RENAME_MAP: &[(&str, &str)] = &[
    ("Order #", TRANSACTION_ID),
    ("Delivery Date", ORDER_DATE),
    ("Food Total", SUBTOTAL),
    ("Check Date", CHECK_DATE),
];

/// Keep this store's orders, oldest delivery first.
pub fn preprocess(raw: &RawInput, ctx: &RunContext) -> Result<Table> {
    let mut table = raw.table.clone();
    if table.has_column(LOCATION) {
        let store = ctx.store.key();
        table.retain_rows(|r| Ok(r.text(LOCATION)?.to_lowercase().contains(store)))?;
    }
    table.sort_rows_by_key(|r| r.timestamp("Delivery Date"))?;
    Ok(table)
}

pub fn normalize(processed: &Table, ctx: &RunContext, rates: &Rates) -> Result<Table> {
    let commission_rate = rates.office_express.commission_rate;
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::OfficeExpress, ctx.store)?;

    t.fill_column(PAYMENT_TYPE, Cell::text(PaymentType::Credit.key()))?;
    t.derive_float(TAX_WITHHELD, |r| Ok(round2(r.float(SUBTOTAL)? * rates.tax_rate)))?;
    t.derive_float(COMMISSION_FEE, |r| Ok(round2(-r.float(SUBTOTAL)? * commission_rate)))?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    t.derive(NOTES, |r| {
        let check = r.text(CHECK_DATE)?;
        let check = check.trim();
        let check = if check.is_empty() { "unknown" } else { check };
        Ok(Cell::text(format!("check date: {check}")))
    })?;
    Ok(t)
}
