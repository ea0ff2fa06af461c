use pantry_core::{PantryClient, Screen};

use crate::cli::DashboardArgs;
use crate::error::CliError;

use super::CommandReport;

pub async fn run(client: &PantryClient, args: &DashboardArgs) -> Result<CommandReport, CliError> {
    let mut screen = Screen::new();
    client.dashboard(&mut screen, args.refresh).await?;
    Ok(CommandReport::new("dashboard", screen.into_state()))
}
