mod account;
mod dashboard;
mod status;
mod trends;

use std::path::PathBuf;
use std::sync::Arc;

use pantry_core::config::max_wait_from_secs;
use pantry_core::{ClientConfig, FileStore, PantryClient, Settlement, ViewState};
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command prints: the screen's final state plus command extras.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReport {
    pub command: &'static str,
    pub state: ViewState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

impl CommandReport {
    pub fn new(command: &'static str, state: ViewState) -> Self {
        Self {
            command,
            state,
            signed_in: None,
            settlement: None,
        }
    }

    pub fn with_signed_in(mut self, signed_in: bool) -> Self {
        self.signed_in = Some(signed_in);
        self
    }

    pub fn with_settlement(mut self, settlement: Option<Settlement>) -> Self {
        self.settlement = settlement;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandReport, CliError> {
    let client = build_client(cli)?;

    match &cli.command {
        Command::Register(args) => account::register(&client, args).await,
        Command::Verify(args) => account::verify(&client, args).await,
        Command::Resend(args) => account::resend(&client, args).await,
        Command::Login(args) => account::login(&client, args).await,
        Command::Logout => account::logout(&client).await,
        Command::Dashboard(args) => dashboard::run(&client, args).await,
        Command::Trends(args) => trends::run(&client, args).await,
        Command::Status(args) => status::run(&client, args).await,
    }
}

fn build_client(cli: &Cli) -> Result<PantryClient, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url.as_str());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    if let Some(seconds) = cli.max_wait_secs {
        config = config.with_max_wait(max_wait_from_secs(seconds));
    }

    let path = state_file(cli)?;
    tracing::debug!(path = %path.display(), api_url = %config.api_url, "opening state");
    let store = FileStore::open(path)?;

    Ok(PantryClient::with_defaults(config, Arc::new(store))?)
}

fn state_file(cli: &Cli) -> Result<PathBuf, CliError> {
    if let Some(path) = &cli.state_file {
        return Ok(path.clone());
    }

    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".pantry").join("state.json"))
        .ok_or_else(|| CliError::Command(String::from("HOME is not set; pass --state-file")))
}
