//! `watch`: print the slots, then every slot that changes, until Ctrl-C
//! or the session ends.

use std::time::Duration;

use tracing::debug;

use qlik_embed_core::{CoreError, Embed, EmbedState, ObjectSubscription};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{activate, render_slots};

const SESSION_END_GRACE: Duration = Duration::from_secs(1);

pub async fn handle(embed: &Embed, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !activate(embed, global).await? {
        return Ok(());
    }
    let Some(mut stream) = embed.subscribe_slots().await else {
        return Ok(());
    };
    let mut state = embed.subscribe_state();

    let mut previous = stream.current().clone();
    output::print_output(&render_slots(&previous, global), global.quiet);

    let mut updates = 0usize;
    loop {
        if args.count.is_some_and(|n| updates >= n) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
            changed = state.changed() => {
                let ended = changed.is_err()
                    || matches!(*state.borrow(), EmbedState::Closed | EmbedState::Failed { .. });
                if ended {
                    break;
                }
            }
            snapshot = stream.changed() => {
                let Some(snapshot) = snapshot else {
                    // The embed state follows a remote close shortly after the slots.
                    let _ = tokio::time::timeout(
                        SESSION_END_GRACE,
                        state.wait_for(|s| *s != EmbedState::Ready),
                    )
                    .await;
                    break;
                };
                let changed: Vec<ObjectSubscription> = snapshot
                    .iter()
                    .zip(previous.iter())
                    .filter(|(now, before)| now != before)
                    .map(|(now, _)| now.clone())
                    .collect();
                if !changed.is_empty() {
                    updates += 1;
                    output::print_output(&render_slots(&changed, global), global.quiet);
                }
                previous = snapshot;
            }
        }
    }

    match embed.state() {
        EmbedState::Failed { message } => Err(CoreError::Session { message }.into()),
        _ => Ok(()),
    }
}
