//! CLI argument definitions for the Pantry Tracker client.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `register` | Create an account |
//! | `verify` | Submit an email verification code |
//! | `resend` | Send a new verification code |
//! | `login` | Sign in, waiting for account data when needed |
//! | `logout` | Drop the session and every cached resource |
//! | `dashboard` | Show the dashboard (cached for an hour) |
//! | `trends` | Show price trends |
//! | `status` | Poll a backend job until it settles |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--api-url` | `PANTRY_API_URL` or `http://localhost:5000/api` | Backend base URL |
//! | `--state-file` | `~/.pantry/state.json` | Persisted session and cache |
//! | `--timeout-ms` | `PANTRY_TIMEOUT_MS` or `10000` | Per-request timeout |
//! | `--max-wait-secs` | `PANTRY_POLL_MAX_WAIT_SECS` or `300` | Poll bound, `0` for none |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! pantry login --email jane@example.com --password 'correct horse'
//! pantry dashboard --pretty
//! pantry trends --product milk-1l --days 30
//! pantry status --kind account-data-fetch --key 64f1c2
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pantry_core::JobKind;

/// Pantry Tracker command-line client.
///
/// Every command prints the final screen state as JSON and exits with code 3
/// when that state is an error.
#[derive(Debug, Parser)]
#[command(name = "pantry", author, version, about = "Pantry Tracker command-line client")]
pub struct Cli {
    /// Backend base URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// File holding the session and cached data.
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Give up on a backend job after this many seconds (0 waits forever).
    #[arg(long, global = true)]
    pub max_wait_secs: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account.
    Register(RegisterArgs),
    /// Submit the code from the verification email.
    Verify(VerifyArgs),
    /// Send a new verification code.
    Resend(EmailArgs),
    /// Sign in.
    Login(LoginArgs),
    /// Sign out and clear local data.
    Logout,
    /// Show the dashboard.
    Dashboard(DashboardArgs),
    /// Show price trends.
    Trends(TrendsArgs),
    /// Poll a backend job until it settles.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    /// Defaults to `--password`.
    #[arg(long)]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub code: String,
}

#[derive(Debug, Clone, Args)]
pub struct EmailArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

#[derive(Debug, Clone, Args)]
pub struct DashboardArgs {
    /// Ignore a fresh cache entry.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TrendsArgs {
    /// Limit to one product.
    #[arg(long)]
    pub product: Option<String>,

    /// Look-back window in days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Ignore a fresh cache entry.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[arg(long, value_enum)]
    pub kind: JobKindArg,

    /// Email address, user id or `me`, depending on the kind.
    #[arg(long)]
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobKindArg {
    EmailVerification,
    AccountDataFetch,
    DashboardAggregate,
}

impl From<JobKindArg> for JobKind {
    fn from(value: JobKindArg) -> Self {
        match value {
            JobKindArg::EmailVerification => Self::EmailVerification,
            JobKindArg::AccountDataFetch => Self::AccountDataFetch,
            JobKindArg::DashboardAggregate => Self::DashboardAggregate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "pantry",
            "dashboard",
            "--refresh",
            "--pretty",
            "--max-wait-secs",
            "0",
        ])
        .expect("valid arguments");

        assert!(cli.pretty);
        assert_eq!(cli.max_wait_secs, Some(0));
        assert!(matches!(cli.command, Command::Dashboard(DashboardArgs { refresh: true })));
    }

    #[test]
    fn status_kind_uses_kebab_case_names() {
        let cli = Cli::try_parse_from([
            "pantry",
            "status",
            "--kind",
            "account-data-fetch",
            "--key",
            "64f1c2",
        ])
        .expect("valid arguments");

        let Command::Status(args) = cli.command else {
            panic!("expected status command");
        };
        assert_eq!(JobKind::from(args.kind), JobKind::AccountDataFetch);
    }
}
