use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{parse_period_date, parse_totals};
use crate::fmt::money;
use crate::importer::load_raw;
use crate::models::Store;
use crate::pipeline::{run_unit, RunContext, UnitOutcome, UnitSpec, Workspace};
use crate::providers::{self, Provider};
use crate::settings::{load_settings, shellexpand_path};

pub struct NormalizeArgs {
    pub files: Vec<String>,
    pub provider: Option<String>,
    pub store: String,
    pub start: String,
    pub end: String,
    pub totals: Vec<String>,
    pub out_dir: Option<String>,
}

/// The named provider, or the one whose columns the export carries.
fn resolve_provider(key: Option<&str>, first_file: &Path) -> anyhow::Result<Provider> {
    if let Some(key) = key {
        return Ok(providers::get_by_key(key)?);
    }
    let raw = load_raw(first_file)
        .with_context(|| format!("reading {} to detect its provider", first_file.display()))?;
    providers::detect(&raw).ok_or_else(|| {
        anyhow!(
            "could not detect the provider of {}; pass --provider",
            first_file.display()
        )
    })
}

pub(crate) fn workspace(out_dir: Option<&str>) -> Workspace {
    match out_dir {
        Some(dir) => Workspace::under(&PathBuf::from(shellexpand_path(dir))),
        None => Workspace::from_settings(&load_settings()),
    }
}

pub fn run(args: NormalizeArgs) -> anyhow::Result<()> {
    let files: Vec<PathBuf> = args.files.iter().map(PathBuf::from).collect();
    let first = files.first().ok_or_else(|| anyhow!("no export given"))?;
    let provider = resolve_provider(args.provider.as_deref(), first)?;
    let store = Store::from_key(&args.store)?;
    let start = parse_period_date(&args.start, false)?;
    let end = parse_period_date(&args.end, true)?;
    let context = RunContext::new(provider, store, start, end)?;

    let spec = UnitSpec {
        context,
        files,
        totals: parse_totals(&args.totals)?,
    };
    let settings = load_settings();
    let workspace = workspace(args.out_dir.as_deref());
    let outcome = run_unit(&spec, &workspace, &settings.rates)
        .with_context(|| format!("normalizing {}", context.label()))?;

    print_outcome(&outcome);
    Ok(())
}

pub(crate) fn print_outcome(outcome: &UnitOutcome) {
    println!(
        "{} {} ({} rows)",
        "Normalized".green().bold(),
        outcome.context.label(),
        outcome.rows
    );
    println!("  processed: {}", outcome.processed.display());
    println!("  canonical: {}", outcome.canonical.display());
    for (file, checksum) in &outcome.checksums {
        println!("  sha256 {}  {}", &checksum[..12.min(checksum.len())], file.display());
    }

    let mut table = Table::new();
    table.set_header(vec!["Before Fees", "After Fees", "Payout"]);
    table.add_row(vec![
        Cell::new(money(outcome.totals.before_fees)),
        Cell::new(money(outcome.totals.after_fees)),
        Cell::new(money(outcome.totals.payout)),
    ]);
    println!("{table}");
}
