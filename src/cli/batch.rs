use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Deserialize;

use crate::cli::normalize::workspace;
use crate::cli::parse_period_date;
use crate::fmt::money;
use crate::models::Store;
use crate::pipeline::{run_batch, RunContext, UnitSpec};
use crate::providers;
use crate::settings::load_settings;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub units: Vec<ManifestUnit>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestUnit {
    pub provider: String,
    pub store: String,
    pub start: String,
    pub end: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub totals: BTreeMap<String, f64>,
}

impl ManifestUnit {
    /// Relative file paths are taken from the manifest's directory.
    fn to_spec(&self, base: &Path) -> anyhow::Result<UnitSpec> {
        let context = RunContext::new(
            providers::get_by_key(&self.provider)?,
            Store::from_key(&self.store)?,
            parse_period_date(&self.start, false)?,
            parse_period_date(&self.end, true)?,
        )?;
        let files = self
            .files
            .iter()
            .map(|f| if f.is_absolute() { f.clone() } else { base.join(f) })
            .collect();
        Ok(UnitSpec {
            context,
            files,
            totals: self.totals.clone(),
        })
    }
}

pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<UnitSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest
        .units
        .iter()
        .enumerate()
        .map(|(i, unit)| unit.to_spec(base).with_context(|| format!("manifest unit {}", i + 1)))
        .collect()
}

pub fn run(manifest: &str, out_dir: Option<&str>) -> anyhow::Result<()> {
    let specs = load_manifest(Path::new(manifest))?;
    let settings = load_settings();
    let report = run_batch(&specs, &workspace(out_dir), &settings.rates);

    let mut table = Table::new();
    table.set_header(vec!["Unit", "Status", "Rows", "Payout"]);
    for (ctx, result) in &report.results {
        match result {
            Ok(outcome) => table.add_row(vec![
                Cell::new(ctx.label()),
                Cell::new("ok"),
                Cell::new(outcome.rows),
                Cell::new(money(outcome.totals.payout)),
            ]),
            Err(e) => table.add_row(vec![
                Cell::new(ctx.label()),
                Cell::new(format!("failed: {e}")),
                Cell::new(""),
                Cell::new(""),
            ]),
        };
    }
    println!("Batch\n{table}");

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{failed} of {} unit(s) failed", report.results.len());
    }
    println!("{} {} unit(s)", "Done".green().bold(), report.results.len());
    Ok(())
}
