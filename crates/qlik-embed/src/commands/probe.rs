//! `probe`: run one identity negotiation and report it.

use serde::Serialize;

use qlik_embed_core::{AuthStatus, Embed};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProbeReport {
    tenant: String,
    status: AuthStatus,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn handle(embed: &Embed, global: &GlobalOpts) -> Result<(), CliError> {
    let session = embed.negotiate().await;
    let color = output::should_color(&global.color);

    let report = ProbeReport {
        tenant: embed.config().tenant.to_string(),
        status: session.status(),
        state: output::state_label(&embed.state(), false),
        login_url: session.login_url().map(ToString::to_string),
        error: session
            .error()
            .filter(|e| e.is_user_facing())
            .map(ToString::to_string),
    };

    let out = output::render_single(
        &global.output,
        &report,
        |r| {
            let mut lines = vec![
                format!("Tenant:  {}", r.tenant),
                format!("Status:  {}", output::state_label(&embed.state(), color)),
            ];
            if let Some(ref url) = r.login_url {
                lines.push(format!("Login:   {url}"));
            }
            if let Some(ref err) = r.error {
                lines.push(format!("Error:   {err}"));
            }
            lines.join("\n")
        },
        |r| r.status.to_string(),
    );
    output::print_output(&out, global.quiet);

    match session.into_result() {
        Ok(_) => Ok(()),
        Err(e) if !e.is_user_facing() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
