//! `fetch`: open the app, print every slot once, close.

use qlik_embed_core::Embed;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{activate, render_slots};

pub async fn handle(embed: &Embed, global: &GlobalOpts) -> Result<(), CliError> {
    if !activate(embed, global).await? {
        return Ok(());
    }
    let slots = embed.slots().await;
    output::print_output(&render_slots(&slots, global), global.quiet);
    Ok(())
}
