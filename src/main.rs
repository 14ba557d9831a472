use clap::Parser;

use tally::cli::{self, normalize::NormalizeArgs, Cli, Commands};
use tally::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Schema => cli::schema::run(),
        Commands::Providers => cli::providers::run(),
        Commands::Normalize {
            files,
            provider,
            store,
            start,
            end,
            totals,
            out_dir,
        } => cli::normalize::run(NormalizeArgs {
            files,
            provider,
            store,
            start,
            end,
            totals,
            out_dir,
        }),
        Commands::Validate {
            file,
            processed,
            provider,
        } => cli::validate::run(&file, processed.as_deref(), provider.as_deref()),
        Commands::Batch { manifest, out_dir } => cli::batch::run(&manifest, out_dir.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
