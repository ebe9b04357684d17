use notes_core::session::SignOutOutcome;

use crate::auth::clear_stored_session;
use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { profile, email } => {
            let context = AppContext::open(profile.as_deref().or(global_profile)).await?;
            println!("Sending magic link...");
            context
                .session
                .request_sign_in(&email)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!(
                "Check your email for the sign-in link. After signing in, you will be redirected."
            );
            println!(
                "To sign in this terminal, run `notes auth verify --email {} --code <code>` with the code from the email.",
                email.trim()
            );
            Ok(())
        }
        AuthCommands::Verify {
            profile,
            email,
            code,
        } => {
            let context = AppContext::open(profile.as_deref().or(global_profile)).await?;
            let session = context
                .session
                .complete_sign_in(&email, &code)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!(
                "Signed in profile '{}' as {}",
                context.profile_name, email_label
            );
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let context = AppContext::open(profile.as_deref().or(global_profile)).await?;
            if let Some(session) = context.auth_state().session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    context.profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{}' is not signed in.", context.profile_name);
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let profile = profile.as_deref().or(global_profile);
            let context = match AppContext::open(profile).await {
                Ok(context) => context,
                // No project configured: only the local session can go.
                Err(CliError::Config(_)) => {
                    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
                    let profile_name = config.resolve_profile_name(profile);
                    clear_stored_session(&profile_name)
                        .map_err(|error| CliError::Auth(error.to_string()))?;
                    println!("Signed out profile '{profile_name}'");
                    return Ok(());
                }
                Err(error) => return Err(error),
            };

            match context.session.sign_out().await {
                SignOutOutcome::Confirmed => {
                    println!("Signed out profile '{}'", context.profile_name);
                }
                SignOutOutcome::LocalOnly(reason) => {
                    println!(
                        "Signed out profile '{}' locally; the server could not be reached ({reason})",
                        context.profile_name
                    );
                }
            }
            Ok(())
        }
    }
}
