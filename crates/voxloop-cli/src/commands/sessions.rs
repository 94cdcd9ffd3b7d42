//! `vox sessions` -- inspect, reset, or clear the active session.

use std::path::Path;

use clap::Subcommand;

use super::build_engine;

/// Subcommands for `vox sessions`.
#[derive(Subcommand)]
pub enum SessionsCmd {
    /// Show the active session and its history.
    Show,

    /// Start a fresh session (server-side history of the old one is
    /// kept).
    New,

    /// Clear the active session's server-side history.
    Clear,
}

/// Run a sessions subcommand.
pub async fn run(action: SessionsCmd, config_path: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config_path)?;

    match action {
        SessionsCmd::Show => {
            let session_id = engine.sessions.current_session().await;
            println!("session: {session_id}");

            match engine.sessions.load_history().await {
                Some(history) => {
                    println!("messages: {}", history.message_count);
                    if let Some(created) = &history.created_at {
                        println!("created: {created}");
                    }
                    if let Some(last) = &history.last_activity {
                        println!("last activity: {last}");
                    }
                    if !history.messages.is_empty() {
                        println!();
                        for turn in engine.sessions.cached_turns() {
                            println!("  {:>9}: {}", turn.role.to_string(), turn.content);
                        }
                    }
                }
                None => {
                    println!("no history yet");
                }
            }
        }
        SessionsCmd::New => {
            let fresh = engine.sessions.new_session().await;
            println!("new session: {fresh}");
        }
        SessionsCmd::Clear => {
            let session_id = engine.sessions.current_session().await;
            engine.sessions.clear_session().await?;
            println!("cleared history for {session_id}");
        }
    }

    Ok(())
}
