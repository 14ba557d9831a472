use chrono::NaiveDate;

use crate::calculator;
use crate::error::{Result, TallyError};
use crate::models::PaymentType;
use crate::normalizer::{self, classify_payment, deduction};
use crate::pipeline::{RawInput, RunContext};
use crate::providers::Provider;
use crate::schema::*;
use crate::settings::Rates;
use crate::table::{Cell, Table};

pub const RAW_COLUMNS: &[&str] = &["Order ID", "Order Type", "Date & Time", "Order Total", "P'ship Fee"];

const ORDER_TOTAL: &str = "Order Total";
const VOIDED: &str = "VOIDED";
const ADJUSTMENTS_MARKER: &str = "slice adjustments";
const ORDER_DAY_FORMAT: &str = "%b %d, %Y";
const LINES_PER_ORDER: usize = 3;
const PHONE: &str = "phone";

const RENAME_MAP: &[(&str, &str)] = &[
    ("Order ID", TRANSACTION_ID),
    ("Order Type", PAYMENT_TYPE),
    ("Date & Time", ORDER_DATE),
    ("Subtotal", SUBTOTAL),
    ("Cust. Delivery Fee", DELIVERY_CHARGE),
    ("Order Adjust.", ADJUSTMENT_FEE),
    ("Tax", TAX_WITHHELD),
    ("Tips", TIP),
    (ORDER_TOTAL, TOTAL_BEFORE_FEES),
    ("P'ship Fee", COMMISSION_FEE),
    ("Proc. Fee", MERCHANT_PROCESSING_FEE),
];

fn first_cell(row: &[Cell]) -> String {
    row.first().map(Cell::render).unwrap_or_default()
}

fn starts_order(row: &[Cell]) -> bool {
    NaiveDate::parse_from_str(first_cell(row).trim(), ORDER_DAY_FORMAT).is_ok()
}

/// A title line carries text in its first cell only.
fn is_title(fragment: &[String]) -> bool {
    fragment.iter().skip(1).all(|c| c.trim().is_empty())
}

/// Column-wise join of several lines, skipping blanks.
fn join_lines(lines: &[Vec<String>], width: usize) -> Vec<String> {
    (0..width)
        .map(|i| {
            lines
                .iter()
                .filter_map(|line| line.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn rendered(row: &[Cell]) -> Vec<String> {
    row.iter().map(Cell::render).collect()
}

/// The order table arrives as CSV extracted from the PDF report, with the
/// header split over several lines and each order spread over three. Stitch
/// both back together and drop voided orders.
pub fn preprocess(raw: &RawInput, _ctx: &RunContext) -> Result<Table> {
    let width = raw.table.columns().len();
    let rows = raw.table.rows();
    let first_order = rows.iter().position(|r| starts_order(r)).unwrap_or(rows.len());
    let end = rows
        .iter()
        .position(|r| first_cell(r).to_lowercase().contains(ADJUSTMENTS_MARKER))
        .unwrap_or(rows.len())
        .max(first_order);

    let mut fragments = vec![raw.table.columns().to_vec()];
    fragments.extend(rows[..first_order].iter().map(|r| rendered(r)));
    fragments.retain(|f| !is_title(f));
    let header = join_lines(&fragments, width);

    let order_lines = &rows[first_order..end];
    if order_lines.len() % LINES_PER_ORDER != 0 {
        return Err(TallyError::Other(format!(
            "order section has {} lines, expected a multiple of {LINES_PER_ORDER}",
            order_lines.len()
        )));
    }

    let mut table = Table::new(header);
    for group in order_lines.chunks(LINES_PER_ORDER) {
        let lines: Vec<Vec<String>> = group.iter().map(|r| rendered(r)).collect();
        let row = join_lines(&lines, width)
            .into_iter()
            .map(|v| if v.is_empty() { Cell::Null } else { Cell::text(v) })
            .collect();
        table.push_row(row)?;
    }
    if table.has_column(ORDER_TOTAL) {
        table.retain_rows(|r| Ok(r.text(ORDER_TOTAL)?.trim() != VOIDED))?;
    }
    Ok(table)
}

fn is_phone(payment: &str) -> bool {
    payment.split_whitespace().next() == Some(PHONE)
}

pub fn normalize(processed: &Table, ctx: &RunContext, _rates: &Rates) -> Result<Table> {
    let mut t = normalizer::normalize(processed, RENAME_MAP, Provider::Slice, ctx.store)?;

    t.derive(NOTES, |r| {
        Ok(if is_phone(&r.text(PAYMENT_TYPE)?) {
            Cell::text("phone order commission record")
        } else {
            Cell::Null
        })
    })?;
    t.derive(PAYMENT_TYPE, |r| {
        let payment = r.text(PAYMENT_TYPE)?;
        let kind = if is_phone(&payment) {
            PaymentType::Credit
        } else {
            classify_payment(&payment)
        };
        Ok(Cell::text(kind.key()))
    })?;
    t.derive_float(TAX_WITHHELD, |r| Ok(r.float(TAX_WITHHELD)?.abs()))?;
    // a positive order adjustment was charged to the customer
    t.derive_float(TIP, |r| Ok(r.float(TIP)? + r.float(ADJUSTMENT_FEE)?.max(0.0)))?;
    t.derive_float(ADJUSTMENT_FEE, |r| Ok(r.float(ADJUSTMENT_FEE)?.min(0.0)))?;
    t.derive_float(COMMISSION_FEE, |r| Ok(deduction(r.float(COMMISSION_FEE)?)))?;
    t.derive_float(MERCHANT_PROCESSING_FEE, |r| {
        Ok(deduction(r.float(MERCHANT_PROCESSING_FEE)?))
    })?;

    calculator::calculate_total_after_fees(&mut t)?;
    calculator::calculate_payout(&mut t)?;
    calculator::zero_cash_payouts(&mut t)?;
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::read_delimited_from;
    use crate::models::Store;
    use crate::providers::fixtures::{close, ctx};
    use crate::validation;

    const EXTRACT: &str = "Orders,,,,,,,,,,\n\
Date &,Order,Order,Subtotal,Cust. Delivery,Order,Tax,Tips,Order,P'ship,Proc.\n\
Time,ID,Type,,Fee,Adjust.,,,Total,Fee,Fee\n\
\"Jan 02, 2023\",82369372,Credit,$40.20,$1.99,$0.00,$3.27,$5.00,$50.46,-$2.99,-$1.82\n\
5:17 PM,,,,,,,,,,\n\
,,Delivery,,,,,,,,\n\
\"Jan 03, 2023\",17719778,Phone,-,-,-,-,-,-,-$2.99,-\n\
6:02 PM,,,,,,,,,,\n\
,,Pickup,,,,,,,,\n\
\"Jan 04, 2023\",17719800,Credit,$12.00,$0.00,$0.00,$0.93,$0.00,VOIDED,$0.00,$0.00\n\
7:40 PM,,,,,,,,,,\n\
,,Pickup,,,,,,,,\n\
\"Jan 05, 2023\",17719901,Cash,$10.00,$0.00,$0.00,$0.78,$0.00,$10.78,-$0.50,$0.00\n\
8:15 PM,,,,,,,,,,\n\
,,Pickup,,,,,,,,\n\
Slice Adjustments,,,,,,,,,,\n\
\"Jan 09, 2023\",Refund,,,,,,,-$4.00,,\n";

    fn processed() -> Table {
        let raw = read_delimited_from(EXTRACT.as_bytes(), b',').unwrap();
        preprocess(&RawInput::from_table(raw), &ctx(Provider::Slice, Store::Ameci)).unwrap()
    }

    #[test]
    fn test_header_and_triplets_stitched() {
        let p = processed();
        assert_eq!(
            p.columns(),
            &[
                "Date & Time",
                "Order ID",
                "Order Type",
                "Subtotal",
                "Cust. Delivery Fee",
                "Order Adjust.",
                "Tax",
                "Tips",
                "Order Total",
                "P'ship Fee",
                "Proc. Fee",
            ]
        );
        // the voided order is gone, the adjustment section is not read
        assert_eq!(p.len(), 3);
        assert_eq!(p.row(0).text("Date & Time").unwrap(), "Jan 02, 2023 5:17 PM");
        assert_eq!(p.row(0).text("Order Type").unwrap(), "Credit Delivery");
    }

    #[test]
    fn test_broken_triplet_is_an_error() {
        let broken = EXTRACT.replacen(",,Pickup,,,,,,,,\n", "", 1);
        let raw = read_delimited_from(broken.as_bytes(), b',').unwrap();
        let result = preprocess(&RawInput::from_table(raw), &ctx(Provider::Slice, Store::Ameci));
        assert!(matches!(result, Err(TallyError::Other(_))));
    }

    #[test]
    fn test_tax_withheld_and_payout() {
        let c = ctx(Provider::Slice, Store::Ameci);
        let p = processed();
        let t = Provider::Slice.normalize(&p, &c, &Rates::default()).unwrap();
        let row = t.row(0);
        assert_eq!(row.text(PAYMENT_TYPE).unwrap(), "credit");
        assert!(close(row.float(TAX_WITHHELD).unwrap(), 3.27));
        assert!(close(row.float(TOTAL_BEFORE_FEES).unwrap(), 50.46));
        assert!(close(row.float(TOTAL_AFTER_FEES).unwrap(), 45.65));
        assert!(close(row.float(PAYOUT).unwrap(), 42.38));

        let checks = Provider::Slice.checks_for(&p);
        assert_eq!(validation::run_checks(&checks, &t, &p), Ok(()));
    }

    #[test]
    fn test_phone_orders_are_commission_records() {
        let c = ctx(Provider::Slice, Store::Ameci);
        let t = Provider::Slice.normalize(&processed(), &c, &Rates::default()).unwrap();
        let phone = t.row(1);
        assert_eq!(phone.text(PAYMENT_TYPE).unwrap(), "credit");
        assert_eq!(phone.text(NOTES).unwrap(), "phone order commission record");
        assert!(close(phone.float(TOTAL_AFTER_FEES).unwrap(), -2.99));

        let cash = t.row(2);
        assert_eq!(cash.text(PAYMENT_TYPE).unwrap(), "cash");
        assert_eq!(cash.float(PAYOUT).unwrap(), 0.0);
        assert_eq!(cash.text(NOTES).unwrap(), "");
    }
}
