use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::calculator::round2;
use crate::error::{Result, TallyError};
use crate::models::{PaymentType, Store};
use crate::providers::Provider;
use crate::schema::{self, ColumnType};
use crate::table::{Cell, Table};

/// Raw column name -> target column. Targets that are not canonical columns
/// are kept as working columns after the canonical ones.
pub type RenameMap<'a> = &'a [(&'a str, &'a str)];

pub fn normalize(raw: &Table, rename_map: RenameMap, provider: Provider, store: Store) -> Result<Table> {
    let context = format!("{} export", provider.key());
    let mut sources = Vec::with_capacity(rename_map.len());
    for (from, _) in rename_map {
        let idx = raw
            .column_index(from)
            .ok_or_else(|| TallyError::missing_column(from, &context))?;
        sources.push(idx);
    }

    let mut columns: Vec<String> = rename_map.iter().map(|(_, to)| to.to_string()).collect();
    columns.push(schema::PROVIDER.to_string());
    columns.push(schema::STORE.to_string());
    let mut table = Table::new(columns);
    for row in raw.rows() {
        let mut cells: Vec<Cell> = sources.iter().map(|&i| row[i].clone()).collect();
        cells.push(Cell::text(provider.key()));
        cells.push(Cell::text(store.key()));
        table.push_row(cells)?;
    }

    for column in schema::columns() {
        let default = match schema::type_of(column) {
            Some(ColumnType::Float) => Cell::Float(0.0),
            _ => Cell::Null,
        };
        table.ensure_column(column, default);
    }

    coerce(&mut table)?;

    let extras: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !schema::is_canonical(c))
        .cloned()
        .collect();
    let mut order = schema::columns();
    order.extend(extras.iter().map(String::as_str));
    table.select(&order)
}

/// Coerce canonical columns to their declared types. Timestamps never
/// silently become null: an unparseable or missing date is an error.
fn coerce(table: &mut Table) -> Result<()> {
    for column in schema::columns() {
        match schema::type_of(column) {
            Some(ColumnType::Float) => table.derive(column, |r| r.float(column).map(Cell::Float))?,
            Some(ColumnType::Timestamp) => {
                table.derive(column, |r| r.timestamp(column).map(Cell::Timestamp))?
            }
            Some(ColumnType::String) => table.map_cells(column, |cell| match cell {
                Cell::Null => Cell::Null,
                other => Cell::text(other.render().trim().to_lowercase()),
            })?,
            None => {}
        }
    }
    Ok(())
}

/// Drop working columns, leaving exactly the canonical schema.
pub fn finalize(table: &Table) -> Result<Table> {
    table.select(&schema::columns())
}

/// Providers report fees with either sign; canonical fees are deductions.
pub fn deduction(value: f64) -> f64 {
    if value > 0.0 {
        -value
    } else {
        value
    }
}

const PAYMENT_PATTERNS: &[(&str, PaymentType)] = &[
    (r"(?i)\bcash\b", PaymentType::Cash),
    (
        r"(?i)visa|master\s*card|\bmc\b|amex|american express|discover|credit|card",
        PaymentType::Credit,
    ),
];

static PAYMENT_REGEXES: LazyLock<Vec<(Regex, PaymentType)>> = LazyLock::new(|| {
    PAYMENT_PATTERNS
        .iter()
        .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, *kind)))
        .collect()
});

/// Collapse a free-text payment method to cash or credit. Anything
/// unrecognized is credit.
pub fn classify_payment(method: &str) -> PaymentType {
    PAYMENT_REGEXES
        .iter()
        .find(|(re, _)| re.is_match(method))
        .map(|(_, kind)| *kind)
        .unwrap_or(PaymentType::Credit)
}

/// One zero-valued canonical row standing in for a period with no orders.
pub fn placeholder(provider: Provider, store: Store, start: NaiveDate) -> Result<Table> {
    let mut table = Table::new(schema::columns().iter().map(|c| c.to_string()).collect());
    let order_date = start
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| TallyError::Other(format!("invalid period start {start}")))?;
    let id = format!(
        "{}_{}_{}_no_orders",
        provider.key(),
        store.key(),
        start.format("%Y_%m_%d")
    );
    let row = schema::columns()
        .into_iter()
        .map(|column| match column {
            schema::PROVIDER => Cell::text(provider.key()),
            schema::STORE => Cell::text(store.key()),
            schema::TRANSACTION_ID => Cell::text(id.as_str()),
            schema::ORDER_DATE => Cell::Timestamp(order_date),
            schema::PAYMENT_TYPE => Cell::text(PaymentType::Credit.key()),
            schema::NOTES => Cell::text("no orders in period"),
            _ => Cell::Float(0.0),
        })
        .collect();
    table.push_row(row)?;
    Ok(table)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    First,
    ConcatDistinct,
}

/// Collapse rows sharing `key` into one row per key, in first-seen order.
/// The output holds `key` followed by the columns named in `rules`.
pub fn aggregate(table: &Table, key: &str, rules: &[(&str, Aggregate)]) -> Result<Table> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in table.iter_rows() {
        let k = row.text(key)?.trim().to_string();
        match index.get(&k) {
            Some(&g) => groups[g].1.push(row.index()),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![row.index()]));
            }
        }
    }

    let mut columns = vec![key.to_string()];
    columns.extend(rules.iter().map(|(c, _)| c.to_string()));
    let mut out = Table::new(columns);
    for (k, members) in &groups {
        let mut cells = vec![Cell::text(k.as_str())];
        for (column, rule) in rules {
            let cell = match rule {
                Aggregate::Sum => {
                    let mut total = 0.0;
                    for &i in members {
                        total += table.row(i).float(column)?;
                    }
                    Cell::Float(round2(total))
                }
                Aggregate::First => table.row(members[0]).get(column)?.clone(),
                Aggregate::ConcatDistinct => {
                    let mut seen: Vec<String> = Vec::new();
                    for &i in members {
                        let value = table.row(i).text(column)?.trim().to_string();
                        if !value.is_empty() && !seen.contains(&value) {
                            seen.push(value);
                        }
                    }
                    if seen.is_empty() {
                        Cell::Null
                    } else {
                        Cell::text(seen.join(", "))
                    }
                }
            };
            cells.push(cell);
        }
        out.push_row(cells)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Table {
        let mut t = Table::with_columns(&["Order #", "Date", "Paid By", "Food", "Kind"]);
        t.push_row(vec![
            Cell::text("A-1"),
            Cell::text("1/2/2023"),
            Cell::text("Visa"),
            Cell::text("$12.50"),
            Cell::text("Delivery"),
        ])
        .unwrap();
        t
    }

    const MAP: &[(&str, &str)] = &[
        ("Order #", schema::TRANSACTION_ID),
        ("Date", schema::ORDER_DATE),
        ("Paid By", schema::PAYMENT_TYPE),
        ("Food", schema::SUBTOTAL),
        ("Kind", "order_type"),
    ];

    #[test]
    fn test_normalize_completes_schema_and_appends_extras() {
        let t = normalize(&raw(), MAP, Provider::Brygid, Store::Ameci).unwrap();
        let mut expected = schema::columns();
        expected.push("order_type");
        assert_eq!(t.columns(), expected.as_slice());
        let row = t.row(0);
        assert_eq!(row.text(schema::PROVIDER).unwrap(), "brygid");
        assert_eq!(row.text(schema::STORE).unwrap(), "ameci");
        assert_eq!(row.text(schema::TRANSACTION_ID).unwrap(), "a-1");
        assert_eq!(row.text(schema::PAYMENT_TYPE).unwrap(), "visa");
        assert_eq!(row.float(schema::SUBTOTAL).unwrap(), 12.5);
        assert_eq!(row.get(schema::TIP).unwrap(), &Cell::Float(0.0));
        assert_eq!(row.text(schema::ORDER_DATE).unwrap(), "2023-01-02 00:00:00");
        // working columns are left as exported
        assert_eq!(row.text("order_type").unwrap(), "Delivery");
    }

    #[test]
    fn test_normalize_missing_raw_column() {
        let mut t = raw();
        t.drop_column("Food");
        let err = normalize(&t, MAP, Provider::Brygid, Store::Ameci).unwrap_err();
        match err {
            TallyError::MissingColumn { column, context } => {
                assert_eq!(column, "Food");
                assert_eq!(context, "brygid export");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalize_fails_loudly_on_bad_date() {
        let mut t = raw();
        t.set(0, "Date", Cell::text("someday")).unwrap();
        assert!(matches!(
            normalize(&t, MAP, Provider::Brygid, Store::Ameci),
            Err(TallyError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_bad_amount() {
        let mut t = raw();
        t.set(0, "Food", Cell::text("twelve")).unwrap();
        assert!(matches!(
            normalize(&t, MAP, Provider::Brygid, Store::Ameci),
            Err(TallyError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_finalize_drops_working_columns() {
        let t = normalize(&raw(), MAP, Provider::Brygid, Store::Ameci).unwrap();
        let f = finalize(&t).unwrap();
        assert_eq!(f.columns(), schema::columns().as_slice());
    }

    #[test]
    fn test_deduction() {
        assert_eq!(deduction(2.5), -2.5);
        assert_eq!(deduction(-2.5), -2.5);
        assert_eq!(deduction(0.0), 0.0);
    }

    #[test]
    fn test_classify_payment() {
        assert_eq!(classify_payment("Visa"), PaymentType::Credit);
        assert_eq!(classify_payment("MasterCard"), PaymentType::Credit);
        assert_eq!(classify_payment("discover"), PaymentType::Credit);
        assert_eq!(classify_payment("Cash"), PaymentType::Cash);
        assert_eq!(classify_payment("CASH"), PaymentType::Cash);
        assert_eq!(classify_payment("gift certificate"), PaymentType::Credit);
        assert_eq!(classify_payment(""), PaymentType::Credit);
    }

    #[test]
    fn test_placeholder_row() {
        let start = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let t = placeholder(Provider::Eatstreet, Store::Aroma, start).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.columns(), schema::columns().as_slice());
        let row = t.row(0);
        assert_eq!(row.text(schema::PAYMENT_TYPE).unwrap(), "credit");
        assert_eq!(
            row.text(schema::TRANSACTION_ID).unwrap(),
            "eatstreet_aroma_2023_05_01_no_orders"
        );
        for column in schema::columns() {
            if schema::type_of(column) == Some(ColumnType::Float) {
                assert_eq!(row.float(column).unwrap(), 0.0, "{column}");
            }
        }
    }

    #[test]
    fn test_aggregate_groups_by_key() {
        let mut t = Table::with_columns(&["id", "amount", "kind", "date"]);
        for (id, amount, kind, date) in [
            ("1001", "10.10", "Dine In", "1/2/2023"),
            ("1002", "4.00", "Takeout", "1/2/2023"),
            ("1001", "2.20", "Delivery", "1/3/2023"),
            ("1001", "1.00", "Dine In", "1/4/2023"),
        ] {
            t.push_row(vec![
                Cell::text(id),
                Cell::text(amount),
                Cell::text(kind),
                Cell::text(date),
            ])
            .unwrap();
        }
        let out = aggregate(
            &t,
            "id",
            &[
                ("amount", Aggregate::Sum),
                ("kind", Aggregate::ConcatDistinct),
                ("date", Aggregate::First),
            ],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.columns(), &["id", "amount", "kind", "date"]);
        let first = out.row(0);
        assert_eq!(first.text("id").unwrap(), "1001");
        assert_eq!(first.float("amount").unwrap(), 13.3);
        assert_eq!(first.text("kind").unwrap(), "Dine In, Delivery");
        assert_eq!(first.text("date").unwrap(), "1/2/2023");
        assert_eq!(out.row(1).float("amount").unwrap(), 4.0);
    }
}
