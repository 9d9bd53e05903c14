//! `token`: the cached bearer token in the local store.

use secrecy::ExposeSecret;

use qlik_embed_core::auth::{REDIRECT_GUARD_KEY, token_cache_key};
use qlik_embed_core::{FileStore, KeyValueStore, TokenLocator};

use crate::cli::{GlobalOpts, TokenArgs, TokenCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: TokenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let tenant = config::resolve_tenant(global)?;
    let host = tenant.host_str().unwrap_or_default().to_string();
    let store = std::sync::Arc::new(FileStore::open(config::resolve_store_path(global)));

    match args.command {
        TokenCommand::Show { reveal } => {
            let token = TokenLocator::new(store).locate(&host).ok_or_else(|| {
                CliError::AuthFailed {
                    message: format!("no cached token for {host}"),
                }
            })?;
            let token = token.expose_secret();
            let shown = if reveal {
                token.to_string()
            } else {
                mask(token)
            };
            output::print_output(&shown, global.quiet);
            Ok(())
        }

        TokenCommand::Set { token } => {
            if token.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "must not be empty".into(),
                });
            }
            store.set(&token_cache_key(&host), token.trim());
            if !global.quiet {
                eprintln!("Token cached for {host}");
            }
            Ok(())
        }

        TokenCommand::Clear => {
            store.remove(&token_cache_key(&host));
            store.remove(REDIRECT_GUARD_KEY);
            if !global.quiet {
                eprintln!("Cleared cached token and redirect guard for {host}");
            }
            Ok(())
        }
    }
}

/// First and last four characters.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail} ({} chars)", chars.len())
}
