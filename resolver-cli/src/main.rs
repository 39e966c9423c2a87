mod cli;
mod commands;
mod config;
mod output;
mod store;

use std::process;

use anyhow::Result;
use clap::{CommandFactory, Parser};
#[cfg(feature = "colored-output")]
use colored::*;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.command.output_format();

    if let Err(e) = run(args).await {
        match output_format {
            Some(OutputFormat::Json) | Some(OutputFormat::JsonCompact) => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": format!("{e:#}"),
                });
                println!("{error_json}");
            }
            _ => {
                error!("Application error: {:#}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {:#}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {e:#}");
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet, args.json_logs);

    if let Commands::Completions { shell } = args.command {
        let mut cmd = Args::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = args.extraction_url {
        config.resolver.extraction_service_url = Some(url);
    }
    if let Some(timeout) = args.timeout {
        config.resolver.request_timeout_secs = timeout;
    }
    if let Some(retries) = args.retries {
        config.resolver.retry_attempts = retries;
    }
    debug!(resolver = ?config.resolver, "Loaded configuration");

    if let Commands::Config { init } = args.command {
        if init {
            let path = args
                .config
                .clone()
                .or_else(AppConfig::default_path)
                .ok_or_else(|| anyhow::anyhow!("no configuration directory on this system"))?;
            if AppConfig::init(&path)? {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists", path.display());
            }
        } else {
            print!("{}", config.show()?);
        }
        return Ok(());
    }

    let colored = cfg!(feature = "colored-output") && !args.quiet;
    let executor = CommandExecutor::new(&config, colored).await?;

    match args.command {
        Commands::Resolve {
            url,
            quality,
            url_only,
            output,
            output_file,
        } => {
            executor
                .resolve(&url, &quality, url_only, output, output_file.as_deref())
                .await?
        }
        Commands::Login { platform } => executor.login(platform).await?,
        Commands::Live {
            platform,
            all,
            output,
        } => executor.live(platform, all, output).await?,
        Commands::Logout { platform } => executor.logout(platform).await?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(verbose)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
