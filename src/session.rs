use std::collections::HashMap;

use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// All mutable state for one chat session: the conversation history, the
/// cache of generated file contents, and the workspace being edited. The
/// session is constructed once by the caller and passed around explicitly,
/// so tests get an isolated instance each.
pub struct ChatSession {
    workspace: Workspace,
    history: Vec<ChatTurn>,
    // Most recent generated content per relative path, so /apply can
    // re-write a file without another model call. Overwritten per path,
    // kept for the life of the process.
    generated: HashMap<String, String>,
}

impl ChatSession {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            history: Vec::new(),
            generated: HashMap::new(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn record_user(&mut self, content: &str) {
        self.history.push(ChatTurn {
            role: Role::User,
            content: content.to_string(),
        });
    }

    pub fn record_assistant(&mut self, content: &str) {
        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: content.to_string(),
        });
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Clears the conversation. Generated content stays cached so /apply
    /// keeps working after a reset.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn cache_generated(&mut self, path: &str, content: &str) {
        self.generated.insert(path.to_string(), content.to_string());
    }

    pub fn generated(&self, path: &str) -> Option<&str> {
        self.generated.get(path).map(String::as_str)
    }

    /// Builds the prompt sent to the model: system instructions, then the
    /// workspace file listing, then the conversation so far, then the new
    /// user message.
    pub fn compose_prompt(&self, system_instructions: &str, user_message: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(system_instructions);
        prompt.push_str("\n\n");

        let files = self.workspace.list_files();
        if !files.is_empty() {
            prompt.push_str("Files in the open project folder:\n");
            for file in &files {
                prompt.push_str(&format!("- {file}\n"));
            }
            prompt.push('\n');
        } else {
            prompt.push_str("The open project folder is empty.\n\n");
        }

        for turn in &self.history {
            match turn.role {
                Role::User => prompt.push_str(&format!("User: {}\n", turn.content)),
                Role::Assistant => prompt.push_str(&format!("Assistant: {}\n", turn.content)),
            }
        }

        prompt.push_str(&format!("User: {user_message}\n"));
        prompt
    }
}
