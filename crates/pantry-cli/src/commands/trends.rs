use pantry_core::{PantryClient, PriceTrendQuery, Screen};

use crate::cli::TrendsArgs;
use crate::error::CliError;

use super::CommandReport;

pub async fn run(client: &PantryClient, args: &TrendsArgs) -> Result<CommandReport, CliError> {
    if args.days == Some(0) {
        return Err(CliError::Command(String::from(
            "--days must be greater than zero",
        )));
    }

    let product_id = args
        .product
        .as_deref()
        .map(str::trim)
        .filter(|product| !product.is_empty())
        .map(str::to_owned);
    let query = PriceTrendQuery {
        product_id,
        days: args.days,
    };

    let mut screen = Screen::new();
    client.price_trends(&mut screen, &query, args.refresh).await?;
    Ok(CommandReport::new("trends", screen.into_state()))
}
