// Content normalization shared by every write path, plus an optional
// reindent pass callers can run on generated code before handing it over.

const INDENT_WIDTH: usize = 4;

/// Normalizes content before it is written to a file: line endings become
/// `\n`, runs of three or more blank lines collapse to a single blank line,
/// and the content ends with exactly one trailing newline.
pub fn normalize(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    for ch in unified.chars() {
        if ch == '\n' {
            newline_run += 1;
            continue;
        }
        if newline_run > 0 {
            // A run of four newlines is three blank lines; collapse such
            // runs to a single blank line.
            let emit = if newline_run >= 4 { 2 } else { newline_run };
            for _ in 0..emit {
                out.push('\n');
            }
            newline_run = 0;
        }
        out.push(ch);
    }
    out.push('\n');
    out
}

/// Converts normalized content to the platform's native line endings. On
/// Windows every `\n` becomes `\r\n`; elsewhere the content passes through.
pub fn to_disk(content: &str) -> String {
    if cfg!(windows) {
        content.replace('\n', "\r\n")
    } else {
        content.to_string()
    }
}

/// Re-indents brace-delimited code with four spaces per nesting level.
/// Brackets inside string literals are ignored. This is a presentation pass
/// and is never applied automatically before a write; it flattens languages
/// where indentation is structure (Python, YAML), so callers opt in.
#[allow(dead_code)]
pub fn reindent(content: &str) -> String {
    let mut depth = 0usize;
    let mut lines = Vec::new();

    for line in content.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            lines.push(String::new());
            continue;
        }

        let this_depth = if opens_with_closer(trimmed) || opens_with_else(trimmed) {
            depth.saturating_sub(1)
        } else {
            depth
        };
        lines.push(format!(
            "{}{}",
            " ".repeat(this_depth * INDENT_WIDTH),
            trimmed
        ));

        let (opened, closed) = bracket_balance(trimmed);
        depth = (depth + opened).saturating_sub(closed);
    }

    lines.join("\n")
}

fn opens_with_closer(trimmed: &str) -> bool {
    trimmed.starts_with(')') || trimmed.starts_with(']') || trimmed.starts_with('}')
}

fn opens_with_else(trimmed: &str) -> bool {
    trimmed == "else" || trimmed.starts_with("else ") || trimmed.starts_with("else{")
}

/// Counts opening and closing brackets on a line, skipping anything inside a
/// string literal or behind a backslash escape.
fn bracket_balance(line: &str) -> (usize, usize) {
    let mut opened = 0;
    let mut closed = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for ch in line.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' => escape_next = true,
            '"' | '\'' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => opened += 1,
            ')' | ']' | '}' if !in_string => closed += 1,
            _ => {}
        }
    }
    (opened, closed)
}
