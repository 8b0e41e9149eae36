mod cli;

use anyhow::Result;
use bincap::{CaseStudy, CaseStudyConfig};
use cli::Cli;

/// Install env_logger at the verbosity the flags ask for; RUST_LOG still wins
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();
}

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(&cli);

    let base = match &cli.config {
        Some(path) => CaseStudyConfig::load_from(path)?,
        None => CaseStudyConfig::default(),
    };
    let config = cli.apply(base);

    CaseStudy::new(config)?.run()?;
    Ok(())
}

fn main() -> Result<()> {
    run()
}
