//! `login-url`: print where to log in.

use qlik_embed_core::Embed;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub fn handle(embed: &Embed, global: &GlobalOpts) -> Result<(), CliError> {
    let url = embed.login_url().ok_or_else(|| CliError::Validation {
        field: "auth_type".into(),
        reason: "a login URL exists only for web-integration identity".into(),
    })?;
    output::print_output(url.as_str(), global.quiet);
    Ok(())
}
