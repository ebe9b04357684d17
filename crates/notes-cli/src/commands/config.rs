use std::env;

use notes_core::config::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            redirect_url,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            redirect_url,
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    redirect_url: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged_supabase_url = normalize_text_option(supabase_url)
        .or_else(|| normalize_text_option(env::var("SUPABASE_URL").ok()))
        .or_else(|| existing_profile.supabase_url());
    let merged_supabase_anon_key = normalize_text_option(supabase_anon_key)
        .or_else(|| normalize_text_option(env::var("SUPABASE_ANON_KEY").ok()))
        .or_else(|| existing_profile.supabase_anon_key());
    let merged_redirect_url = normalize_text_option(redirect_url)
        .or_else(|| normalize_text_option(env::var("NOTES_REDIRECT_URL").ok()))
        .or_else(|| existing_profile.redirect_url());

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = merged_supabase_url {
        profile.supabase_url = Some(value.trim_end_matches('/').to_string());
    }
    if let Some(value) = merged_supabase_anon_key {
        profile.supabase_anon_key = Some(value);
    }
    if let Some(value) = merged_redirect_url {
        profile.redirect_url = Some(value);
    }

    validate_profile_urls(profile)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `notes auth login --email <email>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    for line in describe_profile(&profile_name, profile) {
        println!("{line}");
    }
    Ok(())
}

pub fn describe_profile(profile_name: &str, profile: &CliProfile) -> Vec<String> {
    let unset = || "(unset)".to_string();
    vec![
        format!("profile: {profile_name}"),
        format!(
            "supabase_url: {}",
            profile.supabase_url().unwrap_or_else(unset)
        ),
        format!(
            "supabase_anon_key: {}",
            profile
                .supabase_anon_key()
                .map_or_else(unset, |key| redact_key(&key))
        ),
        format!(
            "redirect_url: {}",
            profile.redirect_url().unwrap_or_else(unset)
        ),
    ]
}

/// Keep a short recognizable prefix of a key.
pub fn redact_key(key: &str) -> String {
    let prefix = key.chars().take(6).collect::<String>();
    if key.chars().count() <= 6 {
        "[REDACTED]".to_string()
    } else {
        format!("{prefix}...[REDACTED]")
    }
}

pub fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(url) = profile.redirect_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "redirect_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
