use anyhow::Result;
use colored::*;

use crate::commands::{self, ChatCommand};
use crate::config::AppConfig;
use crate::handler::ChatHandler;
use crate::protocol::{Inbound, Outbound};
use crate::{input, render_markdown, thinking};

/// Runs the interactive chat shell
pub async fn run_shell(mut handler: ChatHandler, config: &AppConfig) -> Result<()> {
    let header_width = 60;
    println!("{}", "═".repeat(header_width).bright_blue());
    println!("{}", "CodeChat - AI Code Assistant".bright_white().bold());
    println!("{}", "═".repeat(header_width).bright_blue());

    println!(
        "{} {}",
        "Project:".dimmed(),
        handler
            .session()
            .workspace()
            .root()
            .display()
            .to_string()
            .cyan()
    );
    show_model_status(config);

    println!("{}", "─".repeat(header_width).dimmed());
    println!("{} Type '/help' for available commands", "💡".yellow());
    println!("{} Type anything else to chat with the model", "💬".bright_blue());
    println!();

    loop {
        let user_input = input::read_chat_line()?;
        let trimmed = user_input.trim();

        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            "/quit" => {
                println!("{}", "─".repeat(header_width).dimmed());
                println!("{}", "Goodbye!".bright_white());
                break;
            }
            "/help" => {
                println!("{}", commands::HELP_TEXT);
                println!("  /reset                      clear the conversation history");
                println!("  /quit                       leave the shell");
            }
            "/reset" => {
                let turns = handler.session().history().len();
                handler.reset();
                println!("Cleared {turns} conversation turns.");
            }
            _ => {
                // Local commands finish instantly; only model-bound input
                // gets a spinner.
                let spinner = if needs_model(trimmed) {
                    Some(thinking::show_model_thinking())
                } else {
                    None
                };

                let reply = handler
                    .handle(Inbound::Ask {
                        text: trimmed.to_string(),
                    })
                    .await;

                if let Some(spinner) = spinner {
                    spinner.finish();
                }

                if let Outbound::Response { text } = reply {
                    render_markdown(&text);
                }
            }
        }

        println!(); // Add spacing between interactions
    }

    Ok(())
}

fn show_model_status(config: &AppConfig) {
    if std::env::var(&config.model.api_key_env).is_ok() {
        println!("{} {}", "Model:".dimmed(), config.model.name.cyan());
    } else {
        println!(
            "{} {}",
            "Model:".dimmed(),
            format!("{} - Missing API key", config.model.name).yellow()
        );
        println!(
            "{} export {}=your_api_key",
            "Set with:".dimmed(),
            config.model.api_key_env
        );
    }
}

fn needs_model(message: &str) -> bool {
    match commands::parse_chat_command(message) {
        None => true,
        Some(
            ChatCommand::Generate { .. } | ChatCommand::Create { .. } | ChatCommand::Update { .. },
        ) => true,
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_bound_input_shows_a_spinner() {
        assert!(needs_model("explain this error"));
        assert!(needs_model("@src/app.js add a logger"));
        assert!(needs_model("/create notes.txt a shopping list"));
        assert!(needs_model("/update notes.txt add milk"));
    }

    #[test]
    fn local_commands_do_not() {
        assert!(!needs_model("/delete notes.txt"));
        assert!(!needs_model("/apply notes.txt"));
        assert!(!needs_model("/create"));
        assert!(!needs_model("/frobnicate"));
    }
}
