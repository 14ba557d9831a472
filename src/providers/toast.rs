use crate::calculator::{self, round2};
use crate::error::Result;
use crate::normalizer::{self, aggregate, classify_payment, deduction, Aggregate};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &[
    "Order Id",
    "Paid Date",
    "Type",
    "Card Type",
    "Amount",
    "Tip",
    "Tax",
    "Processing Fee",
];

/// Payment lines sharing this value belong to one order.
pub const ORDER_KEY: &str = "Order Id";

const ORDER_TYPE: &str = "order_type";
const AMOUNT: &str = "amount";

const RENAME_MAP: &[(&str, &str)] = &[
    (ORDER_KEY, TRANSACTION_ID),
    ("Paid Date", ORDER_DATE),
    ("Card Type", PAYMENT_TYPE),
    ("Type", ORDER_TYPE),
    ("Amount", AMOUNT),
    ("Tip", TIP),
    ("Tax", TAX),
    ("Processing Fee", MERCHANT_PROCESSING_FEE),
];

const RULES: &[(&str, Aggregate)] = &[
    ("Paid Date", Aggregate::First),
    ("Card Type", Aggregate::First),
    ("Type", Aggregate::ConcatDistinct),
    ("Amount", Aggregate::Sum),
    ("Tip", Aggregate::Sum),
    ("Tax", Aggregate::Sum),
    ("Processing Fee", Aggregate::Sum),
];

/// Fold the payment lines of a split order into one row per order.
pub fn preprocess(raw: &RawInput, _ctx: &RunContext) -> Result<Table> {
    aggregate(&raw.table, ORDER_KEY, RULES)
}

pub fn normalize(processed: &Table, ctx: &RunContext, _rates: &Rates) -> Result<Table> {
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::Toast, ctx.store)?;

    // the paid amount includes tax
    t.derive_float(SUBTOTAL, |r| Ok(round2(r.float(AMOUNT)? - r.float(TAX)?)))?;
    t.derive_float(MERCHANT_PROCESSING_FEE, |r| {
        Ok(deduction(r.float(MERCHANT_PROCESSING_FEE)?))
    })?;
    t.derive(PAYMENT_TYPE, |r| {
        Ok(Cell::text(classify_payment(&r.text(PAYMENT_TYPE)?).key()))
    })?;
    t.derive(NOTES, |r| Ok(Cell::text(r.text(ORDER_TYPE)?.to_lowercase())))?;

    calculator::calculate_total_before_fees(&mut t)?;
    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    calculator::zero_cash_payouts(&mut t)?;
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
                &["1001", "01/05/2023 12:10 PM", "Dine In", "VISA", "21.55", "3.00", "1.55", "0.70"],
                &["1002", "01/05/2023 12:40 PM", "Take Out", "Cash", "10.78", "0.00", "0.78", "0.00"],
                &["1001", "01/05/2023 12:11 PM", "Take Out", "MASTERCARD", "10.78", "1.00", "0.78", "0.36"],
            ],
        ))
    }

    #[test]
    fn test_payment_lines_fold_into_one_order() {
        let c = ctx(Provider::Toast, Store::Aroma);
        let input = raw();
        let p = preprocess(&input, &c).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(
            validation::grouping_cardinality_match(&input.table, &p, ORDER_KEY),
            Ok(())
        );

        let t = Provider::Toast.normalize(&p, &c, &Rates::default()).unwrap();
        let order = t.row(0);
        assert_eq!(order.text(TRANSACTION_ID).unwrap(), "1001");
        assert!(close(order.float(SUBTOTAL).unwrap(), 30.0));
        assert!(close(order.float(TAX).unwrap(), 2.33));
        assert!(close(order.float(TIP).unwrap(), 4.0));
        assert!(close(order.float(MERCHANT_PROCESSING_FEE).unwrap(), -1.06));
        assert_eq!(order.text(NOTES).unwrap(), "dine in, take out");
        assert_eq!(order.text(PAYMENT_TYPE).unwrap(), "credit");
        assert!(close(order.float(TOTAL_BEFORE_FEES).unwrap(), 36.33));
        assert!(close(order.float(PAYOUT).unwrap(), 35.27));
        assert_eq!(validation::all_checks(&t, &p), Ok(()));
    }

    #[test]
    fn test_cash_order_pays_nothing() {
        let c = ctx(Provider::Toast, Store::Aroma);
        let p = preprocess(&raw(), &c).unwrap();
        let t = Provider::Toast.normalize(&p, &c, &Rates::default()).unwrap();
        let cash = t.row(1);
        assert_eq!(cash.text(PAYMENT_TYPE).unwrap(), "cash");
        assert!(close(cash.float(TOTAL_AFTER_FEES).unwrap(), 10.78));
        assert_eq!(cash.float(PAYOUT).unwrap(), 0.0);
    }
}
