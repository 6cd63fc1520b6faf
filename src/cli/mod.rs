mod doctor;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use console::style;

use crate::core::config::AppConfig;
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Core")
        .command("serve", "Start the HTTP API")
        .print();

    GuideSection::new("Diagnostics")
        .command("doctor", "Check engine and history database access")
        .command("help", "Show this help")
        .print();

    GuideSection::new("Options")
        .text("--config, -c <path>   Config file (default: ./qed.toml when present)")
        .text("--host <addr>         Listen address for serve")
        .text("--port <port>         Listen port for serve")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("qed").green()
    );
}

/// Flags shared by the commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CommandFlags {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub(crate) fn parse_command_flags(args: &[String], start: usize) -> Result<CommandFlags> {
    let mut flags = CommandFlags::default();
    let mut i = start;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" | "-c" => {
                let Some(path) = value else {
                    bail!("--config needs a path");
                };
                flags.config = Some(PathBuf::from(path));
                i += 2;
            }
            "--host" => {
                let Some(host) = value else {
                    bail!("--host needs an address");
                };
                flags.host = Some(host.clone());
                i += 2;
            }
            "--port" => {
                let Some(port) = value.and_then(|p| p.parse().ok()) else {
                    bail!("--port needs a number between 1 and 65535");
                };
                flags.port = Some(port);
                i += 2;
            }
            other => bail!("Unknown option: {}", other),
        }
    }
    Ok(flags)
}

/// Loads the config and applies command-line overrides on top.
async fn load_config(flags: &CommandFlags) -> Result<Arc<AppConfig>> {
    let mut config = AppConfig::load(flags.config.as_deref()).await?;
    if let Some(host) = &flags.host {
        config.server.host = host.clone();
    }
    if let Some(port) = flags.port {
        config.server.port = port;
    }
    Ok(Arc::new(config))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1).map(String::as_str) else {
        print_help();
        return Ok(());
    };

    match cmd {
        "serve" => {
            let flags = parse_command_flags(&args, 2)?;
            let config = load_config(&flags).await?;
            crate::logging::init(&config.logging)?;
            serve::run_serve(config).await
        }
        "doctor" => {
            let flags = parse_command_flags(&args, 2)?;
            let config = load_config(&flags).await?;
            if !doctor::run_doctor(&config).await {
                bail!("Some checks failed.");
            }
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
