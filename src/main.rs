use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use webhook_relay::server::{self, AppState};
use webhook_relay::{apply_mappings_with, fields_with_info, MappingRule, Recorder, RelayConfig, TracingObserver};

/// Webhook relay: map inbound JSON callbacks and forward them.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server.
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: PathBuf,
        /// Override `server.host`
        #[arg(long)]
        host: Option<IpAddr>,
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply mapping rules to a JSON document and print the result.
    Map {
        /// JSON document (string)
        json: String,
        /// JSON array of rules: [{"source_field": .., "target_field": .., "fixed_value": ..}]
        rules: String,
        /// Print every mapping event to stderr
        #[arg(long)]
        explain: bool,
    },
    /// List the mappable fields of a JSON document.
    Fields {
        /// JSON document (string)
        json: String,
    },
    /// Load and validate a configuration file.
    Check {
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve { config, host, port } => {
            let mut config = RelayConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            init_tracing(&config.log.level);

            if let Some(host) = host {
                config.server.host = host.to_string();
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let ip: IpAddr = config
                .server
                .host
                .parse()
                .with_context(|| format!("invalid server.host '{}'", config.server.host))?;
            let addr = SocketAddr::new(ip, config.server.port);

            tracing::info!(webhooks = config.webhooks.len(), "configuration loaded");
            let state = AppState::from_config(config)?;
            server::serve(state, addr).await.context("relay server error")?;
        }
        Command::Map { json, rules, explain } => {
            init_tracing("warn");
            let data = parse_json_or_exit(&json);
            let rules: Vec<MappingRule> = match serde_json::from_str(&rules) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Invalid rules: {e}");
                    std::process::exit(1);
                }
            };

            let out = if explain {
                let recorder = Recorder::new();
                let out = apply_mappings_with(&data, &rules, &recorder);
                for event in recorder.events() {
                    eprintln!("{event:?}");
                }
                out
            } else {
                apply_mappings_with(&data, &rules, &TracingObserver)
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Fields { json } => {
            let data = parse_json_or_exit(&json);
            println!("{}", serde_json::to_string_pretty(&fields_with_info(&data))?);
        }
        Command::Check { config } => {
            let config = RelayConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            println!("ok: {} webhook(s)", config.webhooks.len());
        }
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn parse_json_or_exit(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid JSON: {e}");
            std::process::exit(1);
        }
    }
}
