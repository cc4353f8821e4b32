//! Access token generation
//!
//! Exchanges a username/password once for a named Graylog access token and
//! stores it in the config file, so later runs authenticate with the token.

// Local crates
use crate::{
    graylog::{client::GraylogClient, models::FetchError},
    helpers::load_config::Credential,
};

// External crates
use regex::{NoExpand, Regex};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Name under which the token is registered on the server.
pub const TOKEN_NAME: &str = "gtail";

/// Environment variable read instead of prompting for the password.
pub const PASSWORD_ENV: &str = "GTAIL_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to read credentials: {0}")]
    Prompt(#[from] io::Error),
    #[error("Credential prompt task failed: {0}")]
    PromptTask(#[from] tokio::task::JoinError),
    #[error("Could not get tokens: {0}")]
    ListTokens(#[source] FetchError),
    #[error("Could not generate a token: {0}")]
    CreateToken(#[source] FetchError),
    #[error("Server returned an empty token")]
    EmptyToken,
    #[error("Failed to update config file at {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid token pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Where the token ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    pub reused: bool,
    pub saved_to: Option<PathBuf>,
}

/// Prompt for credentials, fetch or create the `gtail` token and save it
/// into the first existing file of `config_paths`.
#[instrument(
    name = "gtail_token::generate",
    target = "helpers::token",
    level = "debug",
    skip_all
)]
pub async fn generate_token(
    client: &GraylogClient,
    config_paths: &[PathBuf],
) -> Result<GeneratedToken, TokenError> {
    let (username, password) = tokio::task::spawn_blocking(prompt_credentials).await??;

    let client = client.with_credential(Credential::Basic {
        username: username.clone(),
        password,
    });

    let existing = client
        .list_tokens(&username)
        .await
        .map_err(TokenError::ListTokens)?
        .into_iter()
        .find(|record| record.name == TOKEN_NAME);

    let (token, reused) = match existing {
        Some(record) => (record.token, true),
        None => {
            let record = client
                .create_token(&username, TOKEN_NAME)
                .await
                .map_err(TokenError::CreateToken)?;
            (record.token, false)
        }
    };

    if token.is_empty() {
        return Err(TokenError::EmptyToken);
    }

    let saved_to = match config_paths.iter().find(|path| path.is_file()) {
        Some(path) => {
            save_token(path, &token)?;
            Some(path.clone())
        }
        None => None,
    };

    tracing::debug!(reused, saved = saved_to.is_some(), "Access token ready");
    Ok(GeneratedToken {
        token,
        reused,
        saved_to,
    })
}

fn prompt_credentials() -> io::Result<(String, String)> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    print!("Username: ");
    io::stdout().flush()?;
    let username = lines.next().transpose()?.unwrap_or_default().trim().to_string();

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => {
            print!("Password: ");
            io::stdout().flush()?;
            lines.next().transpose()?.unwrap_or_default()
        }
    };

    if username.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "username is empty"));
    }
    Ok((username, password))
}

/// Write `token` into the config file at `path`.
pub fn save_token(path: &Path, token: &str) -> Result<(), TokenError> {
    let config_file_error = |source| TokenError::ConfigFile {
        path: path.to_path_buf(),
        source,
    };

    let text = fs::read_to_string(path).map_err(config_file_error)?;
    let updated = upsert_token(&text, token)?;
    fs::write(path, updated).map_err(config_file_error)?;
    Ok(())
}

/// Replace the `token` key of the `[server]` section, or add one.
///
/// Works on the raw text so comments and layout survive.
pub fn upsert_token(text: &str, token: &str) -> Result<String, TokenError> {
    let line = format!("token = {}", toml_string(token));

    let existing = Regex::new(r"(?m)^[ \t]*token[ \t]*=.*$")?;
    if existing.is_match(text) {
        return Ok(existing.replace(text, NoExpand(&line)).into_owned());
    }

    let section = Regex::new(r"(?m)^[ \t]*\[server\][ \t]*$")?;
    if let Some(header) = section.find(text) {
        let mut updated = String::with_capacity(text.len() + line.len() + 1);
        updated.push_str(&text[..header.end()]);
        updated.push('\n');
        updated.push_str(&line);
        updated.push_str(&text[header.end()..]);
        return Ok(updated);
    }

    let mut updated = text.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str("[server]\n");
    updated.push_str(&line);
    updated.push('\n');
    Ok(updated)
}

fn toml_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
