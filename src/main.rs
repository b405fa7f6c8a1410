//! ncprov - naming context provisioning helper
//!
//! Prints the local host's DNS name, locates a writable domain controller,
//! or emits the default security descriptor of a naming context.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use nc_provision::config::DEFAULT_CONFIG_PATH;
use nc_provision::ldap_timeout::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_LDAP_PORT};
use nc_provision::{
    compute_fqdn, find_writable_dc_with_timeout, Credentials, DcLocator, LdapPingLocator,
    LoadParm, PartitionKind, Sid,
};

/// Naming context provisioning helper
#[derive(Parser)]
#[command(name = "ncprov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short = 's', long = "configfile", global = true)]
    configfile: Option<PathBuf>,

    /// Override a configuration parameter (name=value)
    #[arg(long = "option", value_name = "NAME=VALUE", global = true)]
    options: Vec<String>,

    /// Credentials as user[%password]
    #[arg(short = 'U', long = "user", value_name = "USER[%PASSWORD]", global = true)]
    user: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DNS name of this host
    Dnsname,

    /// Find a writable domain controller for the configured realm
    Finddc {
        /// Server to ping instead of resolving the realm (repeatable)
        #[arg(long = "server")]
        servers: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_LDAP_PORT)]
        port: u16,

        /// Overall discovery deadline
        #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },

    /// Print the default security descriptor of a naming context
    Descriptor {
        /// configuration, domain or dns
        partition: PartitionKind,

        /// SID of the domain, e.g. S-1-5-21-1-2-3
        #[arg(long)]
        domain_sid: Sid,

        #[arg(long, value_enum, default_value_t = OutputFormat::Base64)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Self-relative binary descriptor, base64 encoded
    Base64,
    /// Canonical SDDL
    Sddl,
    /// Decoded descriptor as JSON
    Json,
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Loads the configuration, then applies `--option` overrides.
///
/// A missing default file is tolerated; an explicit `-s` file must exist.
fn load_config(cli: &Cli) -> Result<LoadParm> {
    let mut lp = match &cli.configfile {
        Some(path) => LoadParm::load(path)?,
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            LoadParm::load(DEFAULT_CONFIG_PATH)?
        }
        None => {
            debug!("{} not found, using command line options only", DEFAULT_CONFIG_PATH);
            LoadParm::new()
        }
    };
    for option in &cli.options {
        lp.set_option(option)?;
    }
    Ok(lp)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let lp = load_config(&cli)?;
    let credentials = cli
        .user
        .as_deref()
        .map(Credentials::from_user_spec)
        .unwrap_or_else(Credentials::anonymous);

    match cli.command {
        Commands::Dnsname => {
            println!("{}", compute_fqdn(&lp)?);
        }
        Commands::Finddc {
            servers,
            port,
            timeout_secs,
        } => {
            let locator: Arc<dyn DcLocator> = Arc::new(
                LdapPingLocator::new()
                    .with_servers(servers)
                    .with_port(port),
            );
            info!("Discovering writable DC as {}", credentials);
            let host = find_writable_dc_with_timeout(
                lp,
                credentials,
                locator,
                Duration::from_secs(timeout_secs),
            )
            .await
            .context("could not find a writable domain controller")?;
            println!("{}", host);
        }
        Commands::Descriptor {
            partition,
            domain_sid,
            format,
        } => {
            let sd = partition
                .descriptor(&domain_sid)
                .with_context(|| format!("building {} descriptor", partition))?;
            match format {
                OutputFormat::Base64 => {
                    let bytes = partition.build(&domain_sid)?;
                    println!("{}", general_purpose::STANDARD.encode(bytes));
                }
                OutputFormat::Sddl => println!("{}", sd.to_sddl(&domain_sid)),
                OutputFormat::Json => {
                    let doc = serde_json::json!({
                        "partition": partition,
                        "domain_sid": domain_sid,
                        "size": sd.to_bytes().len(),
                        "descriptor": sd,
                    });
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
        }
    }

    Ok(())
}
