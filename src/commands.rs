/// Commands the assistant recognizes inside a chat message. Anything that
/// parses to `None` is a plain prompt for the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// `@<filename> [prompt]`: talk about a file, generating into it by
    /// default.
    Generate {
        path: String,
        prompt: Option<String>,
    },
    /// `/create <filename> <prompt>`
    Create { path: String, prompt: String },
    /// `/update <filename> <prompt>`
    Update { path: String, prompt: String },
    /// `/delete <filename>`
    Delete { path: String },
    /// `/apply <filename>`: write the last generated content for the file.
    Apply { path: String },
    /// A known command missing its arguments.
    Malformed { usage: &'static str },
    /// A slash command outside the supported set.
    Unknown,
}

pub const HELP_TEXT: &str = "Supported commands:\n\
  @<filename> [prompt]        ask about a file or generate content for it\n\
  /create <filename> <prompt> generate a new file\n\
  /update <filename> <prompt> regenerate an existing file\n\
  /delete <filename>          delete a file (a backup guards the delete)\n\
  /apply <filename>           write the last generated content for a file\n\
Anything else is sent to the model as a chat message.";

const USAGE_CREATE: &str = "Usage: /create <filename> <prompt>";
const USAGE_UPDATE: &str = "Usage: /update <filename> <prompt>";
const USAGE_DELETE: &str = "Usage: /delete <filename>";
const USAGE_APPLY: &str = "Usage: /apply <filename>";
const USAGE_GENERATE: &str = "Usage: @<filename> [prompt]";

pub fn parse_chat_command(message: &str) -> Option<ChatCommand> {
    let trimmed = message.trim();

    if let Some(rest) = trimmed.strip_prefix('@') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let path = parts.next().unwrap_or("").trim();
        if path.is_empty() {
            return Some(ChatCommand::Malformed {
                usage: USAGE_GENERATE,
            });
        }
        let prompt = parts
            .next()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        return Some(ChatCommand::Generate {
            path: path.to_string(),
            prompt,
        });
    }

    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let name = parts[0];
    let arg = parts.get(1).map(|a| a.trim()).unwrap_or("");

    match name {
        "/create" => Some(parse_path_and_prompt(arg, USAGE_CREATE, |path, prompt| {
            ChatCommand::Create { path, prompt }
        })),
        "/update" => Some(parse_path_and_prompt(arg, USAGE_UPDATE, |path, prompt| {
            ChatCommand::Update { path, prompt }
        })),
        "/delete" => Some(parse_path_only(arg, USAGE_DELETE, |path| {
            ChatCommand::Delete { path }
        })),
        "/apply" => Some(parse_path_only(arg, USAGE_APPLY, |path| {
            ChatCommand::Apply { path }
        })),
        _ => Some(ChatCommand::Unknown),
    }
}

fn parse_path_and_prompt(
    arg: &str,
    usage: &'static str,
    build: impl FnOnce(String, String) -> ChatCommand,
) -> ChatCommand {
    let parts: Vec<&str> = arg.splitn(2, ' ').collect();
    let path = parts[0].trim();
    let prompt = parts.get(1).map(|p| p.trim()).unwrap_or("");
    if path.is_empty() || prompt.is_empty() {
        return ChatCommand::Malformed { usage };
    }
    build(path.to_string(), prompt.to_string())
}

fn parse_path_only(
    arg: &str,
    usage: &'static str,
    build: impl FnOnce(String) -> ChatCommand,
) -> ChatCommand {
    let path = arg.trim();
    if path.is_empty() {
        return ChatCommand::Malformed { usage };
    }
    build(path.to_string())
}
