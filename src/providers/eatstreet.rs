use crate::calculator::{self, round2};
use crate::error::Result;
use crate::models::PaymentType;
use crate::normalizer::{self, deduction};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["Date", "OrderType", "ID", "Tip", "Total", "Proc", "Comm"];

const ORDER_TYPE: &str = "order_type";

const RENAME_MAP: &[(&str, &str)] = &[
    ("ID", TRANSACTION_ID),
    ("Date", ORDER_DATE),
    ("Tip", TIP),
    ("Total", SUBTOTAL),
    ("Proc", MERCHANT_PROCESSING_FEE),
    ("Comm", COMMISSION_FEE),
    ("OrderType", ORDER_TYPE),
];

pub fn preprocess(raw: &RawInput, _ctx: &RunContext) -> Result<Table> {
    raw.table.select(RAW_COLUMNS)
}

pub fn normalize(processed: &Table, ctx: &RunContext, rates: &Rates) -> Result<Table> {
    let delivery_fee = rates.eatstreet.estimated_delivery_fee;
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::Eatstreet, ctx.store)?;
    let is_delivery = |value: String| value.trim().eq_ignore_ascii_case("delivery");

    t.derive_float(MERCHANT_PROCESSING_FEE, |r| Ok(deduction(r.float(MERCHANT_PROCESSING_FEE)?)))?;
    t.derive_float(COMMISSION_FEE, |r| Ok(deduction(r.float(COMMISSION_FEE)?)))?;
    t.fill_column(PAYMENT_TYPE, Cell::text(PaymentType::Credit.key()))?;
    t.derive_float(DELIVERY_CHARGE, |r| {
        Ok(if is_delivery(r.text(ORDER_TYPE)?) { delivery_fee } else { 0.0 })
    })?;
    t.derive_float(SUBTOTAL, |r| {
        Ok(round2(r.float(SUBTOTAL)? - r.float(TIP)? - r.float(DELIVERY_CHARGE)?))
    })?;
    t.derive_float(TAX_WITHHELD, |r| Ok(round2(rates.tax_rate * r.float(SUBTOTAL)?)))?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    t.derive(NOTES, |r| {
        let note = if is_delivery(r.text(ORDER_TYPE)?) {
            "tax withheld estimated. delivery charge estimated."
        } else {
            "tax withheld estimated."
        };
        Ok(Cell::text(note))
    })?;
    Ok(t)
}
