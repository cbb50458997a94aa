use crate::commands::{self, ChatCommand};
use crate::llm::ModelClient;
use crate::prompts::PromptsConfig;
use crate::protocol::{Inbound, Outbound};
use crate::segmenter::{self, Segment};
use crate::session::ChatSession;

/// Routes panel messages to the model, the segmenter, and the workspace.
/// Owns the session state; everything it needs is injected at construction
/// so tests can run it against a scripted model and a scratch directory.
pub struct ChatHandler {
    session: ChatSession,
    client: Box<dyn ModelClient>,
    prompts: PromptsConfig,
    model: String,
}

impl ChatHandler {
    pub fn new(
        session: ChatSession,
        client: Box<dyn ModelClient>,
        prompts: PromptsConfig,
        model: String,
    ) -> Self {
        Self {
            session,
            client,
            prompts,
            model,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub async fn handle(&mut self, message: Inbound) -> Outbound {
        match message {
            Inbound::Ask { text } => Outbound::Response {
                text: self.handle_ask(&text).await,
            },
            Inbound::GetFileSuggestions { query } => Outbound::FileSuggestions {
                suggestions: self.session.workspace().file_suggestions(&query),
            },
            Inbound::ApplyCode { code, file_path } => Outbound::Response {
                text: self.handle_apply_code(&code, file_path.as_deref()).await,
            },
        }
    }

    async fn handle_ask(&mut self, text: &str) -> String {
        match commands::parse_chat_command(text) {
            None => self.chat_turn(text, text.to_string(), None).await,
            Some(ChatCommand::Generate { path, prompt }) => {
                self.generate_for_file(text, &path, prompt.as_deref()).await
            }
            Some(ChatCommand::Create { path, prompt }) => {
                self.create_with_model(text, &path, &prompt).await
            }
            Some(ChatCommand::Update { path, prompt }) => {
                self.update_with_model(text, &path, &prompt).await
            }
            Some(ChatCommand::Delete { path }) => self.delete_file(&path).await,
            Some(ChatCommand::Apply { path }) => self.apply_cached(&path).await,
            Some(ChatCommand::Malformed { usage }) => usage.to_string(),
            Some(ChatCommand::Unknown) => commands::HELP_TEXT.to_string(),
        }
    }

    /// A free-form prompt: send it, write back any code blocks the model
    /// tagged with a file path, and report per file what happened.
    async fn chat_turn(
        &mut self,
        user_text: &str,
        model_text: String,
        default_file: Option<&str>,
    ) -> String {
        let segments = match self.complete_for(user_text, &model_text).await {
            Ok(segments) => segments,
            Err(message) => return message,
        };

        let mut report = Vec::new();
        for (path, code) in tagged_code(&segments, default_file) {
            report.push(self.write_generated(&path, &code).await);
        }
        render_with_report(&segments, &report)
    }

    async fn generate_for_file(&mut self, raw: &str, path: &str, prompt: Option<&str>) -> String {
        let request = prompt.unwrap_or("Explain what this file does.");
        let current = match self.session.workspace().read_file(path) {
            Ok(content) => format!("Current contents:\n\n{content}"),
            Err(_) => "(the file does not exist yet)".to_string(),
        };
        let model_text = self.prompts.get_reference_prompt(path, request, &current);
        self.chat_turn(raw, model_text, Some(path)).await
    }

    async fn create_with_model(&mut self, raw: &str, path: &str, prompt: &str) -> String {
        let model_text = self.prompts.get_create_prompt(path, prompt);
        let segments = match self.complete_for(raw, &model_text).await {
            Ok(segments) => segments,
            Err(message) => return message,
        };

        let mut report = Vec::new();
        match first_code(&segments) {
            Some(code) => {
                self.session.cache_generated(path, &code);
                match self.session.workspace().create_file(path, &code).await {
                    Ok(written) => report.push(format!("Created {written}")),
                    Err(e) => report.push(format!("Could not create {path}: {e}")),
                }
            }
            None => report.push("The reply contained no code block; nothing was written.".to_string()),
        }
        render_with_report(&segments, &report)
    }

    async fn update_with_model(&mut self, raw: &str, path: &str, prompt: &str) -> String {
        let current = self
            .session
            .workspace()
            .read_file(path)
            .unwrap_or_else(|_| "(the file does not exist yet)".to_string());
        let model_text = self.prompts.get_update_prompt(path, prompt, &current);
        let segments = match self.complete_for(raw, &model_text).await {
            Ok(segments) => segments,
            Err(message) => return message,
        };

        let mut report = Vec::new();
        match first_code(&segments) {
            Some(code) => {
                self.session.cache_generated(path, &code);
                match self.session.workspace().update_file(path, &code).await {
                    Ok(written) => report.push(format!("Updated {written}")),
                    Err(e) => report.push(format!("Could not update {path}: {e}")),
                }
            }
            None => report.push("The reply contained no code block; nothing was written.".to_string()),
        }
        render_with_report(&segments, &report)
    }

    /// Local operation, no model call and no history entry.
    async fn delete_file(&mut self, path: &str) -> String {
        match self.session.workspace().delete_file(path).await {
            Ok(written) => format!("Deleted {written}"),
            Err(e) => format!("Could not delete {path}: {e}"),
        }
    }

    async fn apply_cached(&mut self, path: &str) -> String {
        let code = match self.session.generated(path) {
            Some(code) => code.to_string(),
            None => {
                return format!(
                    "No generated content for {path} yet. Generate some first, for example \
                     with @{path} or /create {path} <prompt>."
                )
            }
        };
        match self.session.workspace().update_file(path, &code).await {
            Ok(written) => format!("Applied the last generated content to {written}"),
            Err(e) => format!("Could not apply to {path}: {e}"),
        }
    }

    async fn handle_apply_code(&mut self, code: &str, file_path: Option<&str>) -> String {
        match self.session.workspace().apply_code_block(code, file_path).await {
            Ok(written) => format!("Wrote {written}"),
            Err(e) => format!("Could not apply the code block: {e}"),
        }
    }

    /// Sends one composed prompt and, on success, records the exchange in
    /// the conversation history. A failed call records nothing and yields
    /// the message to show instead.
    async fn complete_for(
        &mut self,
        user_text: &str,
        model_text: &str,
    ) -> Result<Vec<Segment>, String> {
        let prompt = self
            .session
            .compose_prompt(self.prompts.get_system_instructions(), model_text);
        match self.client.complete(&prompt, &self.model).await {
            Ok(completion) => {
                self.session.record_user(user_text);
                self.session.record_assistant(&completion);
                Ok(segmenter::parse_segments(&completion))
            }
            Err(e) => Err(e.user_message()),
        }
    }

    async fn write_generated(&mut self, path: &str, code: &str) -> String {
        self.session.cache_generated(path, code);
        match self.session.workspace().update_file(path, code).await {
            Ok(written) => format!("Wrote {written}"),
            Err(e) => format!("Could not write {path}: {e}"),
        }
    }
}

/// Pairs each code segment with the file it should be written to. Tagged
/// segments use their own path; the first untagged segment falls back to
/// `default_file` when one is given, and the rest stay chat-only.
fn tagged_code(segments: &[Segment], default_file: Option<&str>) -> Vec<(String, String)> {
    let mut default_file = default_file;
    let mut targets = Vec::new();
    for segment in segments {
        if let Segment::Code {
            file_path, code, ..
        } = segment
        {
            match file_path {
                Some(path) => targets.push((path.clone(), code.clone())),
                None => {
                    if let Some(path) = default_file.take() {
                        targets.push((path.to_string(), code.clone()));
                    }
                }
            }
        }
    }
    targets
}

fn first_code(segments: &[Segment]) -> Option<String> {
    segments.iter().find_map(|segment| match segment {
        Segment::Code { code, .. } => Some(code.clone()),
        _ => None,
    })
}

fn render_with_report(segments: &[Segment], report: &[String]) -> String {
    let mut out = segmenter::render_segments(segments);
    if !report.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        for line in report {
            out.push_str(line);
            out.push('\n');
        }
    }
    if out.is_empty() {
        "The model returned an empty reply.".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::MODEL_DEFAULT;
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct ScriptedModel {
        reply: String,
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<String, ModelError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ModelClient for FailingModel {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<String, ModelError> {
            Err(ModelError::InvalidCredential)
        }
    }

    #[derive(Clone)]
    struct RecordingModel {
        seen: Arc<Mutex<Vec<String>>>,
        reply: String,
    }

    #[async_trait]
    impl ModelClient for RecordingModel {
        async fn complete(&self, prompt: &str, _model: &str) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn handler_with(client: Box<dyn ModelClient>) -> (TempDir, ChatHandler) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let handler = ChatHandler::new(
            ChatSession::new(workspace),
            client,
            PromptsConfig::default(),
            MODEL_DEFAULT.to_string(),
        );
        (dir, handler)
    }

    fn scripted(reply: &str) -> (TempDir, ChatHandler) {
        handler_with(Box::new(ScriptedModel {
            reply: reply.to_string(),
        }))
    }

    async fn ask(handler: &mut ChatHandler, text: &str) -> String {
        match handler
            .handle(Inbound::Ask {
                text: text.to_string(),
            })
            .await
        {
            Outbound::Response { text } => text,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tagged_blocks_are_written_and_reported() {
        let (dir, mut handler) =
            scripted("Sure.\n```js {file: greet.js}\nconsole.log('hi');\n```\nDone.");

        let text = ask(&mut handler, "write a greeting").await;

        assert!(text.contains("Wrote greet.js"), "got: {text}");
        assert_eq!(
            fs::read_to_string(dir.path().join("greet.js")).unwrap(),
            "console.log('hi');\n"
        );
        assert_eq!(handler.session().history().len(), 2);
    }

    #[tokio::test]
    async fn prose_replies_touch_nothing() {
        let (_dir, mut handler) = scripted("Use a HashMap for O(1) lookups.");

        let text = ask(&mut handler, "which container?").await;

        assert!(text.contains("Use a HashMap"));
        assert!(!text.contains("Wrote"));
        assert!(handler.session().workspace().list_files().is_empty());
    }

    #[tokio::test]
    async fn model_failures_become_messages_and_no_history() {
        let (_dir, mut handler) = handler_with(Box::new(FailingModel));

        let text = ask(&mut handler, "hello").await;

        assert!(text.contains("OPENAI_API_KEY"), "got: {text}");
        assert!(handler.session().history().is_empty());
        assert!(handler.session().workspace().list_files().is_empty());
    }

    #[tokio::test]
    async fn file_reference_routes_untagged_code_to_that_file() {
        let (dir, mut handler) = scripted("```js\nlet x = 2;\n```");

        let text = ask(&mut handler, "@calc.js set x to 2").await;

        assert!(text.contains("Wrote calc.js"), "got: {text}");
        assert_eq!(
            fs::read_to_string(dir.path().join("calc.js")).unwrap(),
            "let x = 2;\n"
        );
    }

    #[tokio::test]
    async fn slash_create_writes_the_first_block() {
        let (dir, mut handler) =
            scripted("Here you go.\n```js\nmodule.exports = {};\n```");

        let text = ask(&mut handler, "/create app.js an empty module").await;

        assert!(text.contains("Created app.js"), "got: {text}");
        assert_eq!(
            fs::read_to_string(dir.path().join("app.js")).unwrap(),
            "module.exports = {};\n"
        );
    }

    #[tokio::test]
    async fn slash_create_without_code_reports_it() {
        let (_dir, mut handler) = scripted("I would rather not.");

        let text = ask(&mut handler, "/create app.js something").await;

        assert!(text.contains("no code block"), "got: {text}");
        assert!(handler.session().workspace().list_files().is_empty());
    }

    #[tokio::test]
    async fn slash_update_regenerates_an_existing_file() {
        let (dir, mut handler) = scripted("```js\nlet y = 3;\n```");
        handler
            .session()
            .workspace()
            .create_file("calc.js", "let y = 1;\n")
            .await
            .unwrap();

        let text = ask(&mut handler, "/update calc.js bump y to 3").await;

        assert!(text.contains("Updated calc.js"), "got: {text}");
        assert_eq!(
            fs::read_to_string(dir.path().join("calc.js")).unwrap(),
            "let y = 3;\n"
        );
    }

    #[tokio::test]
    async fn slash_delete_removes_files_and_reports_missing_ones() {
        let (dir, mut handler) = scripted("unused");
        handler
            .session()
            .workspace()
            .create_file("junk.txt", "bye\n")
            .await
            .unwrap();

        let text = ask(&mut handler, "/delete junk.txt").await;
        assert!(text.contains("Deleted junk.txt"), "got: {text}");
        assert!(!dir.path().join("junk.txt").exists());

        let text = ask(&mut handler, "/delete junk.txt").await;
        assert!(text.contains("Could not delete"), "got: {text}");
        // Local commands stay out of the conversation history.
        assert!(handler.session().history().is_empty());
    }

    #[tokio::test]
    async fn slash_apply_rewrites_from_the_cache() {
        let (dir, mut handler) = scripted("```js {file: a.js}\ngenerated();\n```");
        ask(&mut handler, "make a.js").await;

        // Clobber the file behind the assistant's back.
        fs::write(dir.path().join("a.js"), "tampered();\n").unwrap();

        let text = ask(&mut handler, "/apply a.js").await;
        assert!(text.contains("Applied"), "got: {text}");
        assert_eq!(
            fs::read_to_string(dir.path().join("a.js")).unwrap(),
            "generated();\n"
        );
    }

    #[tokio::test]
    async fn slash_apply_without_cache_explains_itself() {
        let (_dir, mut handler) = scripted("unused");
        let text = ask(&mut handler, "/apply never.js").await;
        assert!(text.contains("No generated content"), "got: {text}");
    }

    #[tokio::test]
    async fn unknown_slash_commands_return_the_help_text() {
        let (_dir, mut handler) = scripted("unused");
        let text = ask(&mut handler, "/wat").await;
        assert_eq!(text, commands::HELP_TEXT);
    }

    #[tokio::test]
    async fn malformed_commands_return_their_usage_line() {
        let (_dir, mut handler) = scripted("unused");
        let text = ask(&mut handler, "/create onlyapath").await;
        assert_eq!(text, "Usage: /create <filename> <prompt>");
    }

    #[tokio::test]
    async fn file_suggestions_pass_through_the_protocol() {
        let (_dir, mut handler) = scripted("unused");
        handler
            .session()
            .workspace()
            .create_file("README.md", "# docs\n")
            .await
            .unwrap();

        let out = handler
            .handle(Inbound::GetFileSuggestions {
                query: "read".to_string(),
            })
            .await;
        assert_eq!(
            out,
            Outbound::FileSuggestions {
                suggestions: vec!["README.md".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn apply_code_messages_write_files() {
        let (dir, mut handler) = scripted("unused");

        let out = handler
            .handle(Inbound::ApplyCode {
                code: "let a = 1;\n".to_string(),
                file_path: Some("x.js".to_string()),
            })
            .await;
        match out {
            Outbound::Response { text } => assert!(text.contains("Wrote x.js"), "got: {text}"),
            other => panic!("expected a response, got {other:?}"),
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("x.js")).unwrap(),
            "let a = 1;\n"
        );

        let out = handler
            .handle(Inbound::ApplyCode {
                code: "   ".to_string(),
                file_path: None,
            })
            .await;
        match out {
            Outbound::Response { text } => assert!(text.contains("empty"), "got: {text}"),
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn composed_prompts_carry_listing_history_and_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = RecordingModel {
            seen: seen.clone(),
            reply: "noted".to_string(),
        };
        let (_dir, mut handler) = handler_with(Box::new(model));
        handler
            .session()
            .workspace()
            .create_file("src/main.rs", "fn main() {}\n")
            .await
            .unwrap();

        ask(&mut handler, "first question").await;
        ask(&mut handler, "second question").await;

        let prompts = seen.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("coding assistant"));
        assert!(prompts[0].contains("- src/main.rs"));
        assert!(prompts[1].contains("User: first question"));
        assert!(prompts[1].contains("Assistant: noted"));
        assert!(prompts[1].contains("User: second question"));
    }
}
