//! Command dispatch: bridges CLI args -> the embed facade -> output formatting.

pub mod config_cmd;
pub mod fetch;
pub mod login_url;
pub mod probe;
pub mod token;
pub mod watch;

use std::sync::Arc;

use tabled::Tabled;

use qlik_embed_core::{Embed, FileStore, ObjectSubscription};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::navigator::TerminalNavigator;
use crate::output;

/// Build the embed for the active profile and flags.
pub fn build_embed(global: &GlobalOpts) -> Result<Embed, CliError> {
    let embed_config = config::resolve_embed_config(global)?;
    let store = Arc::new(FileStore::open(config::resolve_store_path(global)));
    let navigator = Arc::new(TerminalNavigator::new(global.quiet));
    Ok(Embed::new(embed_config, store, navigator, None)?)
}

/// Dispatch a tenant-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, embed: &Embed, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Probe => probe::handle(embed, global).await,
        Command::LoginUrl => login_url::handle(embed, global),
        Command::Fetch => fetch::handle(embed, global).await,
        Command::Watch(args) => watch::handle(embed, args, global).await,
        // Local commands are handled before dispatch
        Command::Token(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Activate the embed. A pending login redirect is reported, not failed:
/// returns `Ok(false)` so the caller stops quietly.
pub async fn activate(embed: &Embed, global: &GlobalOpts) -> Result<bool, CliError> {
    match embed.activate().await {
        Ok(()) => Ok(true),
        Err(e) if !e.is_user_facing() => {
            if !global.quiet {
                eprintln!("Login started; rerun once it has completed.");
            }
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

// ── Slot rendering ──────────────────────────────────────────────────

#[derive(Tabled)]
pub struct SlotRow {
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl SlotRow {
    fn new(s: &ObjectSubscription, color: bool) -> Self {
        Self {
            slot: s.slot_id(),
            object: s.object_id.clone(),
            kind: s.display_model.kind().to_string(),
            label: s.display_model.label().unwrap_or_default().to_string(),
            value: output::model_summary(&s.display_model, color),
        }
    }
}

/// Render slots in the selected format.
pub fn render_slots(slots: &[ObjectSubscription], global: &GlobalOpts) -> String {
    let color = output::should_color(&global.color);
    output::render_list(
        &global.output,
        slots,
        |s| SlotRow::new(s, color),
        |s| {
            format!(
                "{}\t{}\t{}\t{}",
                s.slot_id(),
                s.object_id,
                s.display_model.kind(),
                output::model_summary(&s.display_model, false)
            )
        },
    )
}
