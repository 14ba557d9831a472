use comfy_table::{Cell, Table};

use crate::schema::{self, BEFORE_FEES_COMPONENTS};

pub fn run() -> anyhow::Result<()> {
    let fees = schema::fee_columns();
    let mut table = Table::new();
    table.set_header(vec!["#", "Column", "Type", "Role"]);
    for (i, column) in schema::columns().into_iter().enumerate() {
        let kind = schema::type_of(column).map(|t| t.name()).unwrap_or_default();
        let role = if fees.contains(&column) {
            "fee (deduction)"
        } else if BEFORE_FEES_COMPONENTS.contains(&column) {
            "before-fees component"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(column),
            Cell::new(kind),
            Cell::new(role),
        ]);
    }
    println!("Canonical schema\n{table}");
    Ok(())
}
