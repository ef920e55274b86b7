//! synthwrap CLI
//!
//! Operator tooling for the collateral wrapper: config management, fee
//! quotes and scenario simulation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};

use synthwrap::cli::{
    load_or_default, render_quote, render_report, OutputFormat, Scenario, Simulation,
    DEFAULT_CONFIG_FILE,
};
use synthwrap::core::config::WrapperConfig;
use synthwrap::core::fees::FeeQuote;
use synthwrap::utils::math::parse_units;

/// synthwrap - collateral-wrapping ledger
#[derive(Parser)]
#[command(name = "synthwrap")]
#[command(version = synthwrap::VERSION)]
#[command(about = "Operator tooling for the synthwrap collateral wrapper", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "SYNTHWRAP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format (text, json, json-pretty)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Config file management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Fee previews at the configured rates
    #[command(subcommand)]
    Quote(QuoteCommands),

    /// Run a scenario file against an in-process deployment
    Simulate {
        /// Scenario JSON file
        scenario: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// Split a deposit into principal and fee
    Mint {
        /// Collateral amount, e.g. `1.5`
        amount: String,
    },
    /// Split a redemption into principal and fee
    Burn {
        /// Synth amount (fee inclusive)
        amount: String,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Config(cmd) => cmd_config(cli, cmd, term),
        Commands::Quote(cmd) => cmd_quote(cli, cmd, term),
        Commands::Simulate { scenario } => cmd_simulate(cli, scenario, term),
    }
}

fn cmd_config(cli: &Cli, cmd: &ConfigCommands, term: &Term) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if cli.config.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {}. Use --force to overwrite.",
                    cli.config.display()
                );
            }
            WrapperConfig::default()
                .save(&cli.config)
                .with_context(|| format!("writing {}", cli.config.display()))?;
            term.write_line(&format!(
                "{} Wrote {}",
                style("✓").green(),
                cli.config.display()
            ))?;
        }
        ConfigCommands::Show => {
            let config = load_or_default(&cli.config)?;
            match cli.format {
                OutputFormat::Text => {
                    term.write_line(&format!("{} {}", style("→").cyan(), config.describe()?))?;
                }
                _ => term.write_line(&serde_json::to_string_pretty(&config)?)?,
            }
        }
    }
    Ok(())
}

fn cmd_quote(cli: &Cli, cmd: &QuoteCommands, term: &Term) -> anyhow::Result<()> {
    let params = load_or_default(&cli.config)?.to_params()?;
    let (kind, quote) = match cmd {
        QuoteCommands::Mint { amount } => ("mint", FeeQuote::for_mint(parse_units(amount)?, &params)?),
        QuoteCommands::Burn { amount } => ("burn", FeeQuote::for_burn(parse_units(amount)?, &params)?),
    };
    term.write_line(&render_quote(kind, &quote, cli.format)?)?;
    Ok(())
}

fn cmd_simulate(cli: &Cli, path: &Path, term: &Term) -> anyhow::Result<()> {
    let scenario =
        Scenario::load(path).with_context(|| format!("loading scenario {}", path.display()))?;
    let config = match &scenario.config {
        Some(config) => config.clone(),
        None => load_or_default(&cli.config)?,
    };

    let simulation = Simulation::new(&config)?;
    let report = simulation.run(&scenario)?;
    term.write_line(&render_report(&report, cli.format)?)?;

    if cli.format == OutputFormat::Text && report.failures() > 0 {
        term.write_line(&format!(
            "\n{} {} of {} steps rejected",
            style("!").yellow(),
            report.failures(),
            report.steps.len()
        ))?;
    }
    Ok(())
}
