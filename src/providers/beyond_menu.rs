use crate::calculator::{self, round2};
use crate::error::{Result, TallyError};
use crate::normalizer::{self, classify_payment};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["Date", "Order #", "Type", "Paid By", "Amt", "Tip"];

/// Summary figures printed above the order table.
pub const ORDER_COUNT_TOTAL: &str = "Order Count";
pub const DELIVERY_FEE_TOTAL: &str = "Delivery Fee";

const DELIVERY_FEE: &str = "Delivery Fee";
const DELIVERY_TYPE: &str = "deliver";

const RENAME_MAP: &[(&str, &str)] = &[
    ("Date", ORDER_DATE),
    ("Order #", TRANSACTION_ID),
    ("Paid By", PAYMENT_TYPE),
    ("Amt", TOTAL_BEFORE_FEES),
    ("Tip", TIP),
    (DELIVERY_FEE, DELIVERY_CHARGE),
];

const NOTE: &str = "fees calculated by invoice contract. merchant processing estimated.";

/// Spread the summary delivery-fee total evenly over delivery orders and
/// check the summary order count against the rows.
pub fn preprocess(raw: &RawInput, _ctx: &RunContext) -> Result<Table> {
    let mut table = raw.table.clone();
    if let Some(count) = raw.total(ORDER_COUNT_TOTAL) {
        if count.round() as usize != table.len() {
            return Err(TallyError::Other(format!(
                "summary reports {count} orders but the order table has {} rows",
                table.len()
            )));
        }
    }
    if table.is_empty() {
        return Ok(table);
    }

    let is_delivery = |kind: &str| kind.trim().eq_ignore_ascii_case(DELIVERY_TYPE);
    let mut deliveries = 0usize;
    for row in table.iter_rows() {
        if is_delivery(&row.text("Type")?) {
            deliveries += 1;
        }
    }
    let total = raw.total(DELIVERY_FEE_TOTAL).unwrap_or(0.0);
    let average = round2(total / deliveries.max(1) as f64);
    table.derive_float(DELIVERY_FEE, |r| {
        Ok(if is_delivery(&r.text("Type")?) { average } else { 0.0 })
    })?;
    Ok(table)
}

pub fn normalize(processed: &Table, ctx: &RunContext, rates: &Rates) -> Result<Table> {
    let bm = &rates.beyond_menu;
    let fees = bm.store_fees(ctx.store);
    let mut processed = processed.clone();
    processed.ensure_column(DELIVERY_FEE, Cell::Float(0.0));
    let mut t = normalizer::normalize(&processed, RENAME_MAP, Provider::BeyondMenu, ctx.store)?;

    t.fill_column(SERVICE_FEE, Cell::Float(-bm.order_fee))?;
    t.derive_float(SUBTOTAL, |r| {
        let with_tax = r.float(TOTAL_BEFORE_FEES)? - r.float(TIP)? - r.float(DELIVERY_CHARGE)? - bm.order_fee;
        Ok(round2(with_tax / (1.0 + rates.tax_rate)))
    })?;
    t.derive_float(TAX, |r| Ok(round2(r.float(SUBTOTAL)? * rates.tax_rate)))?;
    t.derive_float(COMMISSION_FEE, |r| {
        Ok(round2(
            -(fees.fax_fee + fees.phone_fee + fees.commission_rate * r.float(SUBTOTAL)?),
        ))
    })?;
    t.derive_float(MERCHANT_PROCESSING_FEE, |r| {
        Ok(round2(-bm.merchant_processing_rate * r.float(TOTAL_BEFORE_FEES)?))
    })?;
    t.derive(PAYMENT_TYPE, |r| {
        Ok(Cell::text(classify_payment(&r.text(PAYMENT_TYPE)?).key()))
    })?;

    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    calculator::zero_cash_payouts(&mut t)?;
    t.fill_column(NOTES, Cell::text(NOTE))?;
    Ok(t)
}
