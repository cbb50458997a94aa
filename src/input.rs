use anyhow::Result;
use colored::*;
use reedline::{
    default_emacs_keybindings, Emacs, KeyCode, KeyModifiers, Prompt, PromptEditMode,
    PromptHistorySearch, PromptHistorySearchStatus, Reedline, ReedlineEvent, Signal,
    ValidationResult, Validator,
};

// Keeps the line editor open while the user is mid-way through a fenced
// block, an unbalanced bracket, or an explicit trailing-backslash
// continuation.
pub struct ChatValidator;

impl Validator for ChatValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        let backtick_count = line.matches("```").count();
        if backtick_count % 2 == 1 {
            return ValidationResult::Incomplete;
        }

        let mut paren_count = 0;
        let mut brace_count = 0;
        let mut bracket_count = 0;
        let mut in_string = false;
        let mut escape_next = false;

        for ch in line.chars() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match ch {
                '\\' => escape_next = true,
                // Apostrophes stay plain text; treating them as quotes
                // would trap prose like "don't" in multiline mode.
                '"' => in_string = !in_string,
                '(' if !in_string => paren_count += 1,
                ')' if !in_string => paren_count -= 1,
                '{' if !in_string => brace_count += 1,
                '}' if !in_string => brace_count -= 1,
                '[' if !in_string => bracket_count += 1,
                ']' if !in_string => bracket_count -= 1,
                _ => {}
            }
        }

        if paren_count > 0 || brace_count > 0 || bracket_count > 0 || in_string {
            return ValidationResult::Incomplete;
        }

        if line.trim_end().ends_with('\\') {
            return ValidationResult::Incomplete;
        }

        ValidationResult::Complete
    }
}

pub struct ChatPrompt;

impl Prompt for ChatPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<str> {
        "".into()
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<str> {
        "".into()
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> std::borrow::Cow<str> {
        "› ".bright_cyan().bold().to_string().into()
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<str> {
        "... ".dimmed().to_string().into()
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> std::borrow::Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        format!("({}reverse-search: {}) ", prefix, history_search.term).into()
    }
}

pub fn read_chat_line() -> Result<String> {
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('l'),
        ReedlineEvent::ClearScreen,
    );

    let mut line_editor = Reedline::create()
        .with_edit_mode(Box::new(Emacs::new(keybindings)))
        .with_validator(Box::new(ChatValidator));

    let prompt = ChatPrompt;

    loop {
        let sig = line_editor.read_line(&prompt);
        match sig {
            Ok(Signal::Success(buffer)) => {
                return Ok(buffer);
            }
            Ok(Signal::CtrlD) | Ok(Signal::CtrlC) => {
                println!();
                println!("{}", "Goodbye!".bright_white());
                std::process::exit(0);
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Error reading input: {}", e));
            }
        }
    }
}
