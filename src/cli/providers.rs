use comfy_table::{Cell, Table};

use crate::fmt::{money, percent};
use crate::providers::{Provider, ALL_PROVIDERS};
use crate::settings::{load_settings, Rates};

/// The configured constants a provider's figures are derived from.
fn contract(provider: Provider, rates: &Rates) -> String {
    match provider {
        Provider::BeyondMenu => format!(
            "{} order fee, {} processing (estimated)",
            money(rates.beyond_menu.order_fee),
            percent(rates.beyond_menu.merchant_processing_rate)
        ),
        Provider::Brygid => format!(
            "{} commission, {} to {}",
            percent(rates.brygid.commission_rate),
            money(rates.brygid.commission_min),
            money(rates.brygid.commission_max)
        ),
        Provider::Eatstreet => format!(
            "{} delivery (estimated), {} tax withheld",
            money(rates.eatstreet.estimated_delivery_fee),
            percent(rates.tax_rate)
        ),
        Provider::OfficeExpress => format!(
            "{} commission, {} tax withheld",
            percent(rates.office_express.commission_rate),
            percent(rates.tax_rate)
        ),
        _ => "as reported".to_string(),
    }
}

pub fn run() -> anyhow::Result<()> {
    let rates = load_settings().rates;
    let mut table = Table::new();
    table.set_header(vec!["Key", "Name", "Export", "Date Column", "Contract", "Checks"]);
    for provider in ALL_PROVIDERS {
        let checks: Vec<&str> = provider.checks().iter().map(|c| c.name()).collect();
        table.add_row(vec![
            Cell::new(provider.key()),
            Cell::new(provider.name()),
            Cell::new(format!(".{}", provider.raw_extension())),
            Cell::new(provider.date_column()),
            Cell::new(contract(*provider, &rates)),
            Cell::new(checks.join("\n")),
        ]);
    }
    println!("Providers\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_uses_configured_rates() {
        let mut rates = Rates::default();
        assert_eq!(
            contract(Provider::Brygid, &rates),
            "2.5% commission, $0.50 to $2.00"
        );
        rates.office_express.commission_rate = 0.25;
        assert!(contract(Provider::OfficeExpress, &rates).starts_with("25% commission"));
        assert_eq!(contract(Provider::Toast, &rates), "as reported");
    }
}
