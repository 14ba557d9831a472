use crate::calculator;
use crate::error::{Result, TallyError};
use crate::models::PaymentType;
use crate::normalizer::{self, deduction};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &[
    "Order Number",
    "Event Date",
    "Food Total",
    "Commission",
    "Caterer Total Due",
];

const ORDER_NUMBER: &str = "Order Number";
const STORE_NAME: &str = "Store Name";

const RENAME_MAP: &[(&str, &str)] = &[
    (ORDER_NUMBER, TRANSACTION_ID),
    ("Event Date", ORDER_DATE),
    ("Food Total", SUBTOTAL),
    ("Promotion", MARKETING_FEE),
    ("Delivery Fee", DELIVERY_CHARGE),
    ("Commission", COMMISSION_FEE),
    ("Sales Tax", TAX),
    ("Sales Tax Remitted by ezCater", TAX_WITHHELD),
    ("Tip", TIP),
    ("Payment Transaction Fee", MERCHANT_PROCESSING_FEE),
    ("Adjustments", ADJUSTMENT_FEE),
    ("Discounts", "discounts"),
    ("Misc Fees", "misc_fees"),
    ("Preferred Partner Program", "preferred_partner"),
    ("ezRewards", "ezrewards"),
    ("Caterer Total Due", PAYOUT),
];

/// One ezCater workbook covers every store and ends with a totals row, which
/// carries no order number. Drop it and keep this store's orders.
pub fn preprocess(raw: &RawInput, ctx: &RunContext) -> Result<Table> {
    let mut table = raw.table.clone();
    if let Some(last) = table.len().checked_sub(1) {
        let order = table.row(last).text(ORDER_NUMBER)?;
        if !order.trim().is_empty() {
            return Err(TallyError::Other(format!(
                "ezCater export has no totals row (last row is order {order})"
            )));
        }
        table.pop_row();
    }
    if table.has_column(STORE_NAME) {
        let store = ctx.store.key();
        table.retain_rows(|r| Ok(r.text(STORE_NAME)?.to_lowercase().contains(store)))?;
    }
    Ok(table)
}

pub fn normalize(processed: &Table, ctx: &RunContext, _rates: &Rates) -> Result<Table> {
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::Ezcater, ctx.store)?;

    t.fill_column(PAYMENT_TYPE, Cell::text(PaymentType::Credit.key()))?;
    t.derive_float(MARKETING_FEE, |r| {
        Ok(deduction(r.float(MARKETING_FEE)?)
            + deduction(r.float("preferred_partner")?)
            + deduction(r.float("ezrewards")?)
            + deduction(r.float("discounts")?))
    })?;
    t.derive_float(COMMISSION_FEE, |r| Ok(deduction(r.float(COMMISSION_FEE)?)))?;
    t.derive_float(MERCHANT_PROCESSING_FEE, |r| {
        Ok(deduction(r.float(MERCHANT_PROCESSING_FEE)?))
    })?;
    t.derive_float(TAX_WITHHELD, |r| Ok(r.float(TAX_WITHHELD)?.abs()))?;

    // a positive adjustment is a call-in addition and belongs with the tip
    t.derive_float(TIP, |r| Ok(r.float(TIP)? + r.float(ADJUSTMENT_FEE)?.max(0.0)))?;
    t.derive_float(ADJUSTMENT_FEE, |r| {
        Ok(r.float(ADJUSTMENT_FEE)?.min(0.0) + deduction(r.float("misc_fees")?))
    })?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Store;
    use crate::providers::fixtures::{close, ctx, table};
    use crate::validation;

    const COLUMNS: &[&str] = &[
        "Store Name",
        "Order Number",
        "Event Date",
        "Food Total",
        "Promotion",
        "Delivery Fee",
        "Commission",
        "Sales Tax",
        "Sales Tax Remitted by ezCater",
        "Tip",
        "Payment Transaction Fee",
        "Adjustments",
        "Discounts",
        "Misc Fees",
        "Preferred Partner Program",
        "ezRewards",
        "Caterer Total Due",
    ];

    fn raw() -> RawInput {
        RawInput::from_table(table(
            COLUMNS,
            &[
                &[
                    "Ameci Pizza", "E-1", "2023-01-10 11:30:00", "200.00", "-5.00", "25.00", "-30.00",
                    "0", "0", "20.00", "-6.00", "10.00", "-2.00", "-1.00", "-3.00", "-4.00", "204.00",
                ],
                &[
                    "Aroma Kitchen", "E-2", "2023-01-12 12:00:00", "100.00", "0", "0", "-15.00", "0",
                    "0", "10.00", "-3.00", "-4.00", "0", "0", "0", "0", "88.00",
                ],
                &[
                    "", "", "", "300.00", "-5.00", "25.00", "-45.00", "0", "0", "30.00", "-9.00",
                    "6.00", "-2.00", "-1.00", "-3.00", "-4.00", "292.00",
                ],
            ],
        ))
    }

    #[test]
    fn test_preprocess_drops_totals_and_other_store() {
        let p = preprocess(&raw(), &ctx(Provider::Ezcater, Store::Ameci)).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.row(0).text("Order Number").unwrap(), "E-1");
    }

    #[test]
    fn test_missing_totals_row_is_an_error() {
        let mut input = raw();
        input.table.pop_row();
        let result = preprocess(&input, &ctx(Provider::Ezcater, Store::Aroma));
        assert!(matches!(result, Err(TallyError::Other(msg)) if msg.contains("E-2")));
    }

    #[test]
    fn test_marketing_and_adjustments_folded() {
        let c = ctx(Provider::Ezcater, Store::Ameci);
        let p = preprocess(&raw(), &c).unwrap();
        let t = Provider::Ezcater.normalize(&p, &c, &Rates::default()).unwrap();
        let row = t.row(0);
        // promotion + discounts + preferred partner + ezrewards
        assert!(close(row.float(MARKETING_FEE).unwrap(), -14.0));
        // positive adjustment moved to tip, misc fees kept as adjustment
        assert!(close(row.float(TIP).unwrap(), 30.0));
        assert!(close(row.float(ADJUSTMENT_FEE).unwrap(), -1.0));
        assert!(close(row.float(TOTAL_BEFORE_FEES).unwrap(), 255.0));
        assert!(close(row.float(TOTAL_AFTER_FEES).unwrap(), 204.0));
        assert!(close(row.float(PAYOUT).unwrap(), 204.0));
        assert_eq!(validation::all_checks(&t, &p), Ok(()));
    }

    #[test]
    fn test_negative_adjustment_stays() {
        let c = ctx(Provider::Ezcater, Store::Aroma);
        let p = preprocess(&raw(), &c).unwrap();
        let t = Provider::Ezcater.normalize(&p, &c, &Rates::default()).unwrap();
        let row = t.row(0);
        assert!(close(row.float(TIP).unwrap(), 10.0));
        assert!(close(row.float(ADJUSTMENT_FEE).unwrap(), -4.0));
        assert_eq!(validation::all_checks(&t, &p), Ok(()));
    }
}
