//! `ragchat run`: one pipeline run from the command line.
//!
//! Runs the message through the same pipeline the server uses, without a
//! socket or persisted history. Events go to stderr, the answer to stdout.

use std::sync::Arc;

use rc_domain::config::Config;
use rc_pipeline::PipelineState;
use tokio_util::sync::CancellationToken;

use crate::bootstrap;

pub async fn run(
    config: Arc<Config>,
    message: String,
    session_id: String,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, CancellationToken::new()).await?;

    let history = state
        .store
        .get_history(&session_id, state.config.pipeline.history_limit)
        .await?;
    let input = PipelineState::user_message(session_id, message).with_history(history);
    let outcome = state.executor.execute(input).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    for event in &outcome.events {
        eprintln!("\x1b[2m[{event}]\x1b[0m");
    }
    match outcome.llm_output.as_deref() {
        Some(text) if !text.is_empty() => println!("{text}"),
        _ => {
            eprintln!("error: pipeline produced no answer");
            std::process::exit(1);
        }
    }
    Ok(())
}
