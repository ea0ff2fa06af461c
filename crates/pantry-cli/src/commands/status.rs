use pantry_core::{JobHandle, PantryClient, Screen};

use crate::cli::StatusArgs;
use crate::error::CliError;

use super::CommandReport;

pub async fn run(client: &PantryClient, args: &StatusArgs) -> Result<CommandReport, CliError> {
    let handle = JobHandle::new(args.kind.into(), &args.key)?;

    let mut screen = Screen::new();
    let settlement = client.watch_job(&mut screen, handle).await?;
    Ok(CommandReport::new("status", screen.into_state()).with_settlement(settlement))
}
