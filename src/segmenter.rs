use regex::Regex;

/// One piece of a model completion: either prose or a fenced code block.
/// Code blocks may carry a language hint and a `{file: <path>}` annotation
/// naming the file the block belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text {
        content: String,
    },
    Code {
        language: Option<String>,
        file_path: Option<String>,
        code: String,
    },
}

#[cfg(test)]
impl Segment {
    fn text(content: &str) -> Self {
        Segment::Text {
            content: content.to_string(),
        }
    }

    fn code(language: Option<&str>, file_path: Option<&str>, code: &str) -> Self {
        Segment::Code {
            language: language.map(|s| s.to_string()),
            file_path: file_path.map(|s| s.to_string()),
            code: code.to_string(),
        }
    }
}

/// Splits a model completion into an ordered list of text and code segments.
///
/// A line whose trimmed content starts with ``` toggles between text and
/// code. The opening fence line may carry a language hint and a
/// `{file: path}` annotation; the code body is kept verbatim except that
/// line endings are unified to `\n` and the block ends with exactly one
/// trailing newline. Whitespace-only text between blocks is dropped. A
/// fence left open at the end of the completion is discarded rather than
/// emitted as a half-parsed code segment; the text before it survives.
pub fn parse_segments(response: &str) -> Vec<Segment> {
    let file_tag = Regex::new(r"\{\s*file:\s*([^}]*)\}").unwrap();
    let mut segments = Vec::new();
    let mut text_buf: Vec<&str> = Vec::new();
    let mut code_buf: Vec<&str> = Vec::new();
    // Some(header) while inside a fence; the header is the rest of the
    // opening line after the backticks.
    let mut open_fence: Option<String> = None;

    for line in response.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("```") {
            match open_fence.take() {
                None => {
                    open_fence = Some(rest.to_string());
                    code_buf.clear();
                }
                Some(header) => {
                    flush_text(&mut text_buf, &mut segments);
                    let (language, file_path) = parse_fence_header(&header, &file_tag);
                    segments.push(Segment::Code {
                        language,
                        file_path,
                        code: normalize_code(&code_buf),
                    });
                    code_buf.clear();
                }
            }
        } else if open_fence.is_some() {
            code_buf.push(line);
        } else {
            text_buf.push(line);
        }
    }

    // An unterminated fence is discarded; whatever text preceded it still
    // comes out as a segment.
    flush_text(&mut text_buf, &mut segments);
    segments
}

/// Renders a segment list back into fenced-markdown form. Parsing the
/// result yields an equal segment list.
pub fn render_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text { content } => {
                out.push_str(content);
                out.push('\n');
            }
            Segment::Code {
                language,
                file_path,
                code,
            } => {
                out.push_str("```");
                if let Some(language) = language {
                    out.push_str(language);
                }
                if let Some(path) = file_path {
                    out.push_str(&format!(" {{file: {path}}}"));
                }
                out.push('\n');
                out.push_str(code);
                out.push_str("```\n");
            }
        }
    }
    out
}

fn flush_text(text_buf: &mut Vec<&str>, segments: &mut Vec<Segment>) {
    let joined = text_buf.join("\n");
    text_buf.clear();
    let content = joined.trim();
    if !content.is_empty() {
        segments.push(Segment::Text {
            content: content.to_string(),
        });
    }
}

fn parse_fence_header(header: &str, file_tag: &Regex) -> (Option<String>, Option<String>) {
    let lang_part = match header.split('{').next() {
        Some(part) => part.trim(),
        None => "",
    };
    let language = if lang_part.is_empty() {
        None
    } else {
        Some(lang_part.to_string())
    };

    let file_path = file_tag
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|path| !path.is_empty());

    (language, file_path)
}

fn normalize_code(code_buf: &[&str]) -> String {
    let joined = code_buf.join("\n").replace('\r', "\n");
    format!("{}\n", joined.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_around_a_tagged_block() {
        let response = "Here:\n```js {file: a.js}\nconsole.log(1)\n```\nDone";
        let segments = parse_segments(response);

        assert_eq!(
            segments,
            vec![
                Segment::text("Here:"),
                Segment::code(Some("js"), Some("a.js"), "console.log(1)\n"),
                Segment::text("Done"),
            ]
        );
    }

    #[test]
    fn plain_prose_is_a_single_text_segment() {
        let segments = parse_segments("Just an explanation.\nNothing else.");
        assert_eq!(
            segments,
            vec![Segment::text("Just an explanation.\nNothing else.")]
        );
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_segments() {
        assert!(parse_segments("").is_empty());
        assert!(parse_segments("   \n\n  \t\n").is_empty());
    }

    #[test]
    fn fence_without_language_or_tag() {
        let segments = parse_segments("```\nplain\n```");
        assert_eq!(segments, vec![Segment::code(None, None, "plain\n")]);
    }

    #[test]
    fn fence_with_language_only() {
        let segments = parse_segments("```python\nprint(1)\n```");
        assert_eq!(
            segments,
            vec![Segment::code(Some("python"), None, "print(1)\n")]
        );
    }

    #[test]
    fn fence_with_tag_only() {
        let segments = parse_segments("``` {file: notes.txt}\nhi\n```");
        assert_eq!(
            segments,
            vec![Segment::code(None, Some("notes.txt"), "hi\n")]
        );
    }

    #[test]
    fn file_tag_whitespace_is_trimmed() {
        let segments = parse_segments("```ts {  file:   src/my file.ts  }\nlet x = 1\n```");
        assert_eq!(
            segments,
            vec![Segment::code(
                Some("ts"),
                Some("src/my file.ts"),
                "let x = 1\n"
            )]
        );
    }

    #[test]
    fn empty_file_tag_is_ignored() {
        let segments = parse_segments("```js {file: }\nx\n```");
        assert_eq!(segments, vec![Segment::code(Some("js"), None, "x\n")]);
    }

    #[test]
    fn indented_fences_still_toggle() {
        let segments = parse_segments("  ```js\nlet a = 1\n  ```");
        assert_eq!(segments, vec![Segment::code(Some("js"), None, "let a = 1\n")]);
    }

    #[test]
    fn unterminated_fence_is_discarded() {
        let response = "Explanation first.\n```js {file: a.js}\nconsole.log(1)";
        let segments = parse_segments(response);
        assert_eq!(segments, vec![Segment::text("Explanation first.")]);
    }

    #[test]
    fn code_keeps_interior_whitespace_verbatim() {
        let response = "```py\ndef f():\n    return 1\n\n\nprint(f())\n```";
        let segments = parse_segments(response);
        assert_eq!(
            segments,
            vec![Segment::code(
                Some("py"),
                None,
                "def f():\n    return 1\n\n\nprint(f())\n"
            )]
        );
    }

    #[test]
    fn code_trailing_newlines_collapse_to_one() {
        let segments = parse_segments("```js\nx\n\n\n\n```");
        assert_eq!(segments, vec![Segment::code(Some("js"), None, "x\n")]);
    }

    #[test]
    fn empty_code_block_is_a_single_newline() {
        let segments = parse_segments("```js\n```");
        assert_eq!(segments, vec![Segment::code(Some("js"), None, "\n")]);
    }

    #[test]
    fn crlf_responses_are_unified() {
        let response = "Intro\r\n```js {file: a.js}\r\nlet x = 1\r\n```\r\n";
        let segments = parse_segments(response);
        assert_eq!(
            segments,
            vec![
                Segment::text("Intro"),
                Segment::code(Some("js"), Some("a.js"), "let x = 1\n"),
            ]
        );
    }

    #[test]
    fn blank_text_between_blocks_is_dropped() {
        let response = "```js\na\n```\n\n   \n```js\nb\n```";
        let segments = parse_segments(response);
        assert_eq!(
            segments,
            vec![
                Segment::code(Some("js"), None, "a\n"),
                Segment::code(Some("js"), None, "b\n"),
            ]
        );
    }

    #[test]
    fn n_fences_give_n_code_segments_in_order() {
        let response = "one\n```js {file: a.js}\n1\n```\ntwo\n```ts {file: b.ts}\n2\n```\nthree\n```\n3\n```\nfour";
        let segments = parse_segments(response);

        let code_count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Code { .. }))
            .count();
        assert_eq!(code_count, 3);
        assert_eq!(segments.len(), 7);

        // Text and code alternate and stay in input order here.
        for (i, segment) in segments.iter().enumerate() {
            if i % 2 == 0 {
                assert!(matches!(segment, Segment::Text { .. }));
            } else {
                assert!(matches!(segment, Segment::Code { .. }));
            }
        }
    }

    #[test]
    fn render_then_parse_round_trips() {
        let response = "Intro text\n```js {file: src/app.js}\nconst x = 1;\nconsole.log(x);\n```\nmiddle\n```\nanon block\n```\nOutro";
        let segments = parse_segments(response);
        let rendered = render_segments(&segments);
        assert_eq!(parse_segments(&rendered), segments);
    }

    #[test]
    fn render_reproduces_fence_annotations() {
        let segments = vec![Segment::code(Some("js"), Some("a.js"), "x\n")];
        assert_eq!(render_segments(&segments), "```js {file: a.js}\nx\n```\n");
    }

}
