//! simplecert - local certificate authority and TLS certificate issuer

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use simplecert::config::{FailurePolicy, PkiConfig};
use simplecert::orchestrator::{Flow, Orchestrator};
use simplecert::prompt::DialoguerPrompt;
use simplecert::provider::RustCryptoProvider;

/// Bootstraps a local CA on first run and issues end-entity certificates from it.
#[derive(Parser, Debug)]
#[command(name = "simplecert", version, about, long_about = None)]
struct Cli {
    /// Directory holding the `ca/` and `eu/` trees
    #[arg(long, env = "SIMPLECERT_DATA_ROOT", default_value = "/home/data")]
    data_root: PathBuf,

    /// Country (C) of every certificate subject
    #[arg(long, default_value = "US")]
    country: String,

    /// State or province (ST) of every certificate subject
    #[arg(long, default_value = "TX")]
    province: String,

    /// OpenSSL-style request config used as the SAN template
    #[arg(long)]
    san_template: Option<PathBuf>,

    /// Stop at the first failed issuance step
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = PkiConfig::builder()
        .data_root(cli.data_root)
        .country(cli.country)
        .province(cli.province)
        .maybe_san_template(cli.san_template)
        .failure_policy(if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::ContinueOnError
        })
        .build();

    let mut orchestrator =
        Orchestrator::new(config, RustCryptoProvider::new(), DialoguerPrompt::new())?;
    let outcome = orchestrator.run()?;
    let layout = orchestrator.layout();

    if outcome.flow == Flow::FreshSetup {
        println!("CA certificate:        {}", layout.ca_cert().display());
        println!("CA private key:        {}", layout.ca_key().display());
    }
    println!("Certificate:           {}", layout.eu_cert().display());
    println!("Private key:           {}", layout.eu_key().display());
    println!("PKCS#12 bundle:        {}", layout.eu_p12().display());
    if layout.eu_passphrase_file().is_file() {
        println!("Key passphrase:        {}", layout.eu_passphrase_file().display());
    }

    if !outcome.report.is_success() {
        for (step, reason) in &outcome.report.failed {
            eprintln!("{step} failed: {reason}");
        }
        anyhow::bail!(
            "{} of {} steps failed",
            outcome.report.failed.len(),
            outcome.report.failed.len() + outcome.report.completed.len()
        );
    }
    Ok(())
}
