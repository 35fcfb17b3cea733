use clap::{Parser, Subcommand};
use ldap_filter::{compile_filter_with, decompile_bytes_with, FilterConfig, FilterKind};
use std::path::PathBuf;
use tracing::{debug, info};
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "ldap-filter")]
#[command(about = "Compile RFC 4515 LDAP filters to BER and decompile them back to text")]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the BER encoding of a filter as hex
    Compile { filter: String },
    /// Print the filter text for hex-encoded BER
    Decompile { hex: String },
    /// Compile, encode, decode and decompile a filter, failing if the text changes
    Check { filter: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("ldap_filter={},info", log_level))
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            info!("Configuration source: file {:?}", path);
            FilterConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => FilterConfig::default(),
    };
    debug!("Configuration: {:?}", config);

    match args.command {
        Command::Compile { filter } => {
            let packet = compile_filter_with(&filter, &config)?;
            println!("{}", hex::encode(packet.to_bytes()));
        }
        Command::Decompile { hex } => {
            let bytes = hex::decode(hex.trim()).context("Input is not valid hex")?;
            println!("{}", decompile_bytes_with(&bytes, &config)?);
        }
        Command::Check { filter } => {
            let packet = compile_filter_with(&filter, &config)?;
            let kind = FilterKind::from_tag(packet.tag)?;
            let text = decompile_bytes_with(&packet.to_bytes(), &config)?;
            if text != filter {
                anyhow::bail!("Round trip changed filter: {} -> {}", filter, text);
            }
            println!("{}: {}", kind, text);
        }
    }

    Ok(())
}
