use crate::calculator;
use crate::error::Result;
use crate::fmt::money;
use crate::models::PaymentType;
use crate::normalizer::{self, deduction};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["DateWeekEnding", "OrderTotal", "AmountDue", "Orders", "CSHangups"];

const WEEK_ENDING: &str = "DateWeekEnding";
const ORDER_TOTAL: &str = "order_total";
const ORDER_COUNT: &str = "order_count";
const HANGUPS: &str = "hangups";

const RENAME_MAP: &[(&str, &str)] = &[
    (WEEK_ENDING, ORDER_DATE),
    ("OrderTotal", ORDER_TOTAL),
    ("AmountDue", COMMISSION_FEE),
    ("Orders", ORDER_COUNT),
    ("CSHangups", HANGUPS),
];

/// Keep the weeks ending inside the period.
pub fn preprocess(raw: &RawInput, ctx: &RunContext) -> Result<Table> {
    let mut table = raw.table.clone();
    table.retain_rows(|r| Ok(ctx.contains(r.timestamp(WEEK_ENDING)?)))?;
    Ok(table)
}

/// Each week becomes a fee-only row. The sales themselves land in the POS.
pub fn normalize(processed: &Table, ctx: &RunContext, _rates: &Rates) -> Result<Table> {
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::OrderInn, ctx.store)?;

    // one row per week, so the week-ending time is a unique id
    t.derive(TRANSACTION_ID, |r| {
        Ok(Cell::text(r.timestamp(ORDER_DATE)?.format("%Y_%m_%d_%H_%M_%S").to_string()))
    })?;
    t.fill_column(PAYMENT_TYPE, Cell::text(PaymentType::Credit.key()))?;
    t.derive_float(COMMISSION_FEE, |r| Ok(deduction(r.float(COMMISSION_FEE)?)))?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    t.derive(NOTES, |r| {
        Ok(Cell::text(format!(
            "{} orders. {} hangups. {} sales counted in pos.",
            r.text(ORDER_COUNT)?.trim(),
            r.text(HANGUPS)?.trim(),
            money(r.float(ORDER_TOTAL)?),
        )))
    })?;
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Store;
    use crate::providers::fixtures::{close, ctx, table};
    use crate::validation;

    fn raw() -> RawInput {
        RawInput::from_table(table(
            RAW_COLUMNS,
            &[
                &["12/31/2022", "$410.00", "$41.00", "14", "1"],
                &["1/7/2023", "$1,250.50", "$125.05", "40", "3"],
                &["1/31/2023", "$300.00", "$30.00", "9", "0"],
                &["2/4/2023", "$120.00", "$12.00", "4", "0"],
            ],
        ))
    }

    #[test]
    fn test_preprocess_keeps_weeks_in_period() {
        let p = preprocess(&raw(), &ctx(Provider::OrderInn, Store::Ameci)).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.row(1).text(WEEK_ENDING).unwrap(), "1/31/2023");
    }

    #[test]
    fn test_fee_only_rows() {
        let c = ctx(Provider::OrderInn, Store::Ameci);
        let p = preprocess(&raw(), &c).unwrap();
        let t = Provider::OrderInn.normalize(&p, &c, &Rates::default()).unwrap();
        let row = t.row(0);
        assert_eq!(row.text(TRANSACTION_ID).unwrap(), "2023_01_07_00_00_00");
        assert_eq!(row.float(SUBTOTAL).unwrap(), 0.0);
        assert_eq!(row.float(TOTAL_BEFORE_FEES).unwrap(), 0.0);
        assert!(close(row.float(COMMISSION_FEE).unwrap(), -125.05));
        assert!(close(row.float(TOTAL_AFTER_FEES).unwrap(), -125.05));
        assert!(close(row.float(PAYOUT).unwrap(), -125.05));
        assert_eq!(
            row.text(NOTES).unwrap(),
            "40 orders. 3 hangups. $1,250.50 sales counted in pos."
        );
        assert_eq!(validation::all_checks(&t, &p), Ok(()));
    }
}
