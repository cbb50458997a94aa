use std::path::PathBuf;

use anyhow::Context;

mod cli;
mod commands;
mod config;
mod error;
mod format;
mod handler;
mod input;
mod llm;
mod prompts;
mod protocol;
mod segmenter;
mod session;
mod thinking;
mod workspace;

use crate::handler::ChatHandler;
use crate::llm::OpenAiClient;
use crate::prompts::PromptsConfig;
use crate::session::ChatSession;
use crate::workspace::Workspace;

/// Renders model output as markdown in the terminal.
pub fn render_markdown(text: &str) {
    let skin = termimad::MadSkin::default();
    skin.print_text(text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The project folder is the first argument, or wherever we were started.
    let root = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().context("Could not determine the current directory")?,
    };

    let config = config::load_or_create(None)?;
    config.validate()?;

    let workspace = Workspace::open(&root)?;
    let session = ChatSession::new(workspace);

    let prompts = PromptsConfig::load().unwrap_or_default();

    let api_key = std::env::var(&config.model.api_key_env).ok();
    let client = OpenAiClient::new(&config.model.endpoint, api_key);

    let handler = ChatHandler::new(
        session,
        Box::new(client),
        prompts,
        config.model.name.clone(),
    );

    cli::run_shell(handler, &config).await
}
