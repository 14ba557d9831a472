use std::path::Path;

use anyhow::bail;
use colored::Colorize;

use crate::importer::load_raw;
use crate::providers;
use crate::table::Table;
use crate::validation::{read_canonical, Check};

pub fn run(file: &str, processed: Option<&str>, provider: Option<&str>) -> anyhow::Result<()> {
    let canonical = read_canonical(Path::new(file))?;
    let processed_table = match processed {
        Some(p) => Some(load_raw(Path::new(p))?),
        None => None,
    };
    let checks: Vec<Check> = match provider {
        Some(key) => providers::get_by_key(key)?.checks().to_vec(),
        None => Check::ALL.to_vec(),
    };

    let empty = Table::default();
    let mut failures = 0;
    for check in checks {
        let processed = match (&processed_table, check) {
            (Some(p), _) => p,
            (None, Check::RecordCountMatch) => {
                println!("  {} {} (no --processed file)", "skip".dimmed(), check.name());
                continue;
            }
            (None, _) => &empty,
        };
        match check.run(&canonical, processed) {
            Ok(()) => println!("  {} {}", "ok".green(), check.name()),
            Err(e) => {
                failures += 1;
                println!("  {} {}: {e}", "FAIL".red().bold(), check.name());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed for {file}");
    }
    println!("{} {} ({} rows)", "Valid".green().bold(), file, canonical.len());
    Ok(())
}
