use pantry_core::{Email, LoginForm, PantryClient, Screen, SignupForm, VerificationCode, ViewState};

use crate::cli::{EmailArgs, LoginArgs, RegisterArgs, VerifyArgs};
use crate::error::CliError;

use super::CommandReport;

pub async fn register(
    client: &PantryClient,
    args: &RegisterArgs,
) -> Result<CommandReport, CliError> {
    let confirm = args.confirm_password.as_deref().unwrap_or(&args.password);
    let form = SignupForm::new(&args.name, &args.email, &args.password, confirm)?;

    let mut screen = Screen::new();
    client.register(&mut screen, &form).await?;
    Ok(CommandReport::new("register", screen.into_state()))
}

pub async fn verify(client: &PantryClient, args: &VerifyArgs) -> Result<CommandReport, CliError> {
    let email = Email::parse(&args.email)?;
    let code = VerificationCode::parse(&args.code)?;

    let mut screen = Screen::new();
    client.verify_email(&mut screen, &email, &code).await?;
    Ok(CommandReport::new("verify", screen.into_state()))
}

pub async fn resend(client: &PantryClient, args: &EmailArgs) -> Result<CommandReport, CliError> {
    let email = Email::parse(&args.email)?;

    let mut screen = Screen::new();
    client.resend_verification(&mut screen, &email).await?;
    Ok(CommandReport::new("resend", screen.into_state()))
}

pub async fn login(client: &PantryClient, args: &LoginArgs) -> Result<CommandReport, CliError> {
    let form = LoginForm::new(&args.email, &args.password)?;

    let mut screen = Screen::new();
    let signed_in = client.login(&mut screen, &form).await?;
    Ok(CommandReport::new("login", screen.into_state()).with_signed_in(signed_in))
}

pub async fn logout(client: &PantryClient) -> Result<CommandReport, CliError> {
    client.logout().await?;
    Ok(CommandReport::new("logout", ViewState::Idle).with_signed_in(false))
}
