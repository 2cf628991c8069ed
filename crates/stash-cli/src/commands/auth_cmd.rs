use std::env;
use std::path::Path;

use stash_core::util::{non_blank, now_secs};

use crate::auth::{AuthSession, AuthUser, SessionStore};
use crate::cli::AuthCommands;
use crate::commands::common::load_config;
use crate::error::CliError;

const ACCESS_TOKEN_ENV: &str = "STASH_ACCESS_TOKEN";

pub fn run_auth(command: AuthCommands, config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let api_base_url = config
        .api_base_url
        .as_deref()
        .ok_or(CliError::SyncNotConfigured)?;
    let store = SessionStore::new(api_base_url);

    match command {
        AuthCommands::Login {
            user_id,
            email,
            access_token,
            refresh_token,
            expires_in,
        } => {
            let access_token = access_token.or_else(|| env::var(ACCESS_TOKEN_ENV).ok());
            let session = build_session(
                &user_id,
                email,
                access_token,
                refresh_token,
                expires_in,
                now_secs(),
            )?;
            store.save(&session)?;

            let label = session.user.email.as_deref().unwrap_or(&session.user.id);
            println!("Signed in to {api_base_url} as {label}");
        }
        AuthCommands::Status => match store.load()? {
            Some(session) if session.is_expired() => {
                println!(
                    "Session for {} expired (expires_at={}). Run `stash auth login`.",
                    session.user.id, session.expires_at
                );
            }
            Some(session) => {
                let label = session.user.email.as_deref().unwrap_or(&session.user.id);
                println!(
                    "Signed in to {api_base_url} as {label} (expires_at={})",
                    session.expires_at
                );
            }
            None => println!("Not signed in to {api_base_url}."),
        },
        AuthCommands::Logout => {
            store.clear()?;
            println!("Signed out of {api_base_url}");
        }
    }

    Ok(())
}

/// Validate login arguments into a session record.
pub fn build_session(
    user_id: &str,
    email: Option<String>,
    access_token: Option<String>,
    refresh_token: String,
    expires_in: i64,
    now_secs: i64,
) -> Result<AuthSession, CliError> {
    let user_id = non_blank(Some(user_id.to_string()))
        .ok_or_else(|| CliError::Auth("user id cannot be empty".to_string()))?;
    let access_token = non_blank(access_token).ok_or_else(|| {
        CliError::Auth(format!(
            "access token required (--access-token or {ACCESS_TOKEN_ENV})"
        ))
    })?;
    if expires_in <= 0 {
        return Err(CliError::Auth(
            "expires-in must be a positive number of seconds".to_string(),
        ));
    }

    Ok(AuthSession {
        access_token,
        refresh_token,
        expires_at: now_secs.saturating_add(expires_in),
        user: AuthUser {
            id: user_id,
            email: non_blank(email),
        },
    })
}
