pub mod batch;
pub mod init;
pub mod normalize;
pub mod providers;
pub mod schema;
pub mod validate;

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};

/// Parse a period bound. `YYYY-MM-DD` and `YYYY/MM/DD` name a day; `YYYY-MM`
/// names a month and resolves to its first day, or its last when `end`.
pub(crate) fn parse_period_date(raw: &str, end: bool) -> anyhow::Result<NaiveDate> {
    let s = raw.trim().replace('/', "-");
    if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(d);
    }
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() == 2 {
        if let (Ok(year), Ok(month)) = (parts[0].parse::<i32>(), parts[1].parse::<u32>()) {
            let first = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| anyhow!("invalid month: {raw}"))?;
            if !end {
                return Ok(first);
            }
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, first.month() + 1, 1)
            };
            return next
                .and_then(|d| d.pred_opt())
                .ok_or_else(|| anyhow!("invalid month: {raw}"));
        }
    }
    bail!("invalid date {raw:?}: expected YYYY-MM-DD or YYYY-MM")
}

/// `KEY=VALUE` summary figures, e.g. `--total "Order Count=42"`.
pub(crate) fn parse_totals(pairs: &[String]) -> anyhow::Result<BTreeMap<String, f64>> {
    let mut totals = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got {pair:?}"))?;
        let value = crate::importer::parse_amount(value)
            .with_context(|| format!("not a number in total {pair:?}"))?;
        totals.insert(key.trim().to_string(), value);
    }
    Ok(totals)
}

#[derive(Parser)]
#[command(name = "tally", about = "Normalize and validate delivery-provider order reports.")]
pub struct Cli {
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and create the raw/processed/data folders.
    Init {
        /// Path for tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Print the canonical transaction schema.
    Schema,
    /// List supported providers and what each expects.
    Providers,
    /// Normalize one provider export into a canonical CSV.
    Normalize {
        /// Raw export file(s)
        #[arg(required = true)]
        files: Vec<String>,
        /// Provider key (detected from the export's columns if omitted)
        #[arg(long)]
        provider: Option<String>,
        /// Store key: ameci, aroma
        #[arg(long)]
        store: String,
        /// Period start: YYYY-MM-DD or YYYY-MM
        #[arg(long)]
        start: String,
        /// Period end: YYYY-MM-DD or YYYY-MM
        #[arg(long)]
        end: String,
        /// Summary figure shipped beside the export, as KEY=VALUE
        #[arg(long = "total")]
        totals: Vec<String>,
        /// Write processed/ and data/ under this directory instead
        #[arg(long = "out-dir")]
        out_dir: Option<String>,
    },
    /// Run the table checks against a canonical CSV.
    Validate {
        /// Canonical CSV file
        file: String,
        /// Processed file the canonical file came from (enables the row-count check)
        #[arg(long)]
        processed: Option<String>,
        /// Provider key, to apply only the checks that provider is held to
        #[arg(long)]
        provider: Option<String>,
    },
    /// Run every unit listed in a JSON manifest.
    Batch {
        /// Manifest file
        manifest: String,
        /// Write processed/ and data/ under this directory instead
        #[arg(long = "out-dir")]
        out_dir: Option<String>,
    },
}
