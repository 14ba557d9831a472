use std::path::PathBuf;

use colored::Colorize;

use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> anyhow::Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    for dir in [settings.raw_dir(), settings.processed_dir(), settings.canonical_dir()] {
        std::fs::create_dir_all(&dir)?;
    }
    save_settings(&settings)?;

    let root = PathBuf::from(&settings.data_dir);
    println!("{} {}", "Initialized".green().bold(), root.display());
    println!("  raw exports:     {}", settings.raw_dir().display());
    println!("  processed files: {}", settings.processed_dir().display());
    println!("  canonical files: {}", settings.canonical_dir().display());
    Ok(())
}
