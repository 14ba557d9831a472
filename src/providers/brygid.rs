use crate::calculator::{self, round2};
use crate::error::Result;
use crate::normalizer::{self, classify_payment, deduction};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["ORDER_ID", "DATE", "TOTAL_BEFORE_TAX", "DEL_CHARGE", "PAY_TYPE"];

/// Columns kept from the export; customer contact details are dropped.
const ORDER_COLUMNS: &[&str] = &[
    "STORE",
    "ORDER_ID",
    "DATE",
    "TYPE",
    "TOTAL_BEFORE_TAX",
    "DEL_CHARGE",
    "TIP_AMOUNT",
    "TOTAL_TAX",
    "TOTAL_AFTER_TAX",
    "TOTAL_DISCOUNT",
    "PAY_TYPE",
    "PAY_AMOUNT",
];

const RENAME_MAP: &[(&str, &str)] = &[
    ("ORDER_ID", TRANSACTION_ID),
    ("DATE", ORDER_DATE),
    ("PAY_TYPE", PAYMENT_TYPE),
    ("TOTAL_BEFORE_TAX", SUBTOTAL),
    ("TIP_AMOUNT", TIP),
    ("TOTAL_TAX", TAX),
    ("DEL_CHARGE", DELIVERY_CHARGE),
    ("TOTAL_DISCOUNT", MARKETING_FEE),
];

const NOTE: &str = "merchant processing not included (vantiv).";

pub fn preprocess(raw: &RawInput, _ctx: &RunContext) -> Result<Table> {
    let mut table = raw.table.select(ORDER_COLUMNS)?;
    table.sort_rows_by_key(|r| r.timestamp("DATE"))?;
    Ok(table)
}

pub fn normalize(processed: &Table, ctx: &RunContext, rates: &Rates) -> Result<Table> {
    let br = &rates.brygid;
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::Brygid, ctx.store)?;

    // the export's subtotal includes the delivery charge
    t.derive_float(SUBTOTAL, |r| {
        Ok(round2(r.float(SUBTOTAL)? - r.float(DELIVERY_CHARGE)?))
    })?;
    t.derive_float(MARKETING_FEE, |r| Ok(deduction(r.float(MARKETING_FEE)?)))?;
    t.derive_float(COMMISSION_FEE, |r| {
        let commission = (br.commission_rate * r.float(SUBTOTAL)?)
            .max(br.commission_min)
            .min(br.commission_max);
        Ok(round2(-commission))
    })?;
    t.derive(PAYMENT_TYPE, |r| {
        Ok(Cell::text(classify_payment(&r.text(PAYMENT_TYPE)?).key()))
    })?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    calculator::zero_cash_payouts(&mut t)?;
    t.fill_column(NOTES, Cell::text(NOTE))?;
    Ok(t)
}
