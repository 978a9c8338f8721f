mod cli;
mod config;
mod orchestrator;

use clap::Parser;
use cli::Cli;

fn main() {
	let cli = Cli::parse();

	let mut builder = env_logger::Builder::from_default_env();
	if cli.quiet {
		builder.filter_level(log::LevelFilter::Error);
	} else if std::env::var_os("RUST_LOG").is_none() {
		builder.filter_level(log::LevelFilter::Info);
	}
	builder.init();

	if let Err(e) = orchestrator::run(&cli) {
		log::error!("{e:#}");
		std::process::exit(1);
	}
}
