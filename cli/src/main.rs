#![deny(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![warn(clippy::expect_used)]

use std::process::ExitCode;

use crate::app_config::AppConfig;
use args::{CliArgs, Command};
use clap::Parser;
use commands::{
    completions::completions_cmd, config::config_cmd, init::init_cmd, options::options_cmd,
    query::query_cmd, request::request_cmd,
};
use profile::{get_profile_path, Profile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app_config;
mod args;
mod commands;
mod formatters;
mod profile;

#[cfg(test)]
mod test;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    setup_tracing();

    let args = CliArgs::parse();

    let profile_path = get_profile_path(&args.config.profile_path);

    if let Some(command) = args.command {
        let profile = Profile::from_path(&profile_path)?;
        let config = AppConfig::from_args(args.config, &profile_path, profile.as_ref());

        match command {
            Command::Config => config_cmd(&config)?,
            Command::Init(init_args) => init_cmd(&config, &profile_path, init_args)?,
            Command::Request(request_args) => {
                if !request_cmd(&config, request_args).await? {
                    return Ok(ExitCode::FAILURE);
                }
            }
            Command::Options(options_args) => options_cmd(&config, options_args).await?,
            Command::Query(query_args) => query_cmd(query_args)?,
            Command::Completions { shell } => completions_cmd(shell),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{crate_name}=info,caravan_core=info",
                    crate_name = env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
