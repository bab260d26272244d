//! Field directives embedded in chat text.
//!
//! Two grammars are recognised:
//!
//! - `[READ_FIELD:<id>]`, expanded in outgoing user text before it is sent.
//! - `[WRITE_FIELD:<id>]<body>[/WRITE_FIELD]`, extracted from a completed
//!   assistant response. Bodies are matched non-greedily and never nest.
//!
//! Both are found by a small scanner rather than a regex. Write directives must
//! only be extracted from fully accumulated text: a partial stream can end in
//! the middle of an id or body.

const READ_OPEN: &str = "[READ_FIELD:";
const WRITE_OPEN: &str = "[WRITE_FIELD:";
const WRITE_CLOSE: &str = "[/WRITE_FIELD]";

/// A parsed write directive with its body already trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteDirective {
    pub field: String,
    pub content: String,
}

/// Byte offsets of one complete write directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WriteSpan {
    start: usize,
    end: usize,
    id_start: usize,
    id_end: usize,
    body_start: usize,
    body_end: usize,
}

enum ScanState {
    SeekingOpen,
    SeekingClose {
        start: usize,
        id_start: usize,
        id_end: usize,
    },
}

/// An opening tag `<open><id>]` found at or after `from`.
/// Returns `(tag start, id start, id end)`; ids are never empty.
fn find_tag(text: &str, open: &str, mut from: usize) -> Option<(usize, usize, usize)> {
    loop {
        let start = from + text.get(from..)?.find(open)?;
        let id_start = start + open.len();
        let id_end = id_start + text[id_start..].find(']')?;
        if id_end > id_start {
            return Some((start, id_start, id_end));
        }
        from = start + 1;
    }
}

fn scan_write_spans(text: &str) -> Vec<WriteSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    let mut state = ScanState::SeekingOpen;

    loop {
        match state {
            ScanState::SeekingOpen => {
                let Some((start, id_start, id_end)) = find_tag(text, WRITE_OPEN, cursor) else {
                    break;
                };
                cursor = id_end + 1;
                state = ScanState::SeekingClose {
                    start,
                    id_start,
                    id_end,
                };
            }
            ScanState::SeekingClose {
                start,
                id_start,
                id_end,
            } => {
                // No close tag left means no later opener can complete either.
                let Some(offset) = text[cursor..].find(WRITE_CLOSE) else {
                    break;
                };
                let body_end = cursor + offset;
                let end = body_end + WRITE_CLOSE.len();
                spans.push(WriteSpan {
                    start,
                    end,
                    id_start,
                    id_end,
                    body_start: cursor,
                    body_end,
                });
                cursor = end;
                state = ScanState::SeekingOpen;
            }
        }
    }

    spans
}

/// Extract every complete write directive, in order of appearance.
pub fn extract_write_directives(text: &str) -> Vec<WriteDirective> {
    scan_write_spans(text)
        .into_iter()
        .filter_map(|span| {
            let field = text[span.id_start..span.id_end].trim();
            if field.is_empty() {
                return None;
            }
            Some(WriteDirective {
                field: field.to_string(),
                content: text[span.body_start..span.body_end].trim().to_string(),
            })
        })
        .collect()
}

/// Remove every complete write directive, leaving the surrounding prose as is.
pub fn strip_write_directives(text: &str) -> String {
    let spans = scan_write_spans(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Whether `text` holds at least one complete write directive.
pub fn contains_write_directive(text: &str) -> bool {
    !scan_write_spans(text).is_empty()
}

/// Expand each `[READ_FIELD:<id>]` with the field's current value.
///
/// `lookup` returns `None` when the field does not exist.
pub fn resolve_read_directives<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some((start, id_start, id_end)) = find_tag(text, READ_OPEN, cursor) {
        out.push_str(&text[cursor..start]);
        let field = text[id_start..id_end].trim();
        match lookup(field) {
            Some(value) => {
                out.push_str(&format!("[Field \"{field}\" contains: \"{value}\"]"));
            }
            None => out.push_str(&format!("[Field \"{field}\" not found]")),
        }
        cursor = id_end + 1;
    }

    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(field: &str, content: &str) -> WriteDirective {
        WriteDirective {
            field: field.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn multiple_writes_parse_and_strip() {
        let text = "A [WRITE_FIELD:x]1[/WRITE_FIELD] B [WRITE_FIELD:y]2[/WRITE_FIELD] C";
        assert_eq!(
            extract_write_directives(text),
            vec![write("x", "1"), write("y", "2")]
        );
        assert_eq!(strip_write_directives(text), "A  B  C");
    }

    #[test]
    fn read_ids_are_trimmed_in_lookup_and_echo() {
        let mut asked = Vec::new();
        let out = resolve_read_directives("[READ_FIELD: title ] [READ_FIELD: gone ]", |id| {
            asked.push(id.to_string());
            (id == "title").then(|| "Hello".to_string())
        });
        assert_eq!(out, "[Field \"title\" contains: \"Hello\"] [Field \"gone\" not found]");
        assert_eq!(asked, vec!["title", "gone"]);
        assert_eq!(
            extract_write_directives("[WRITE_FIELD: title ]x[/WRITE_FIELD]")[0].field,
            "title"
        );
    }

    #[test]
    fn strip_without_directives_is_identity() {
        for text in ["", "plain text", "  padded  ", "[WRITE_FIELD:x] no close", "[/WRITE_FIELD]"] {
            assert_eq!(strip_write_directives(text), text);
        }
    }

    #[test]
    fn body_is_trimmed_and_may_span_lines() {
        let text = "[WRITE_FIELD:body]\n  line one\nline two \n[/WRITE_FIELD]";
        assert_eq!(
            extract_write_directives(text),
            vec![write("body", "line one\nline two")]
        );
    }

    #[test]
    fn unterminated_directive_is_ignored() {
        let text = "done [WRITE_FIELD:a]x[/WRITE_FIELD] then [WRITE_FIELD:b]partial";
        assert_eq!(extract_write_directives(text), vec![write("a", "x")]);
        assert_eq!(
            strip_write_directives(text),
            "done  then [WRITE_FIELD:b]partial"
        );
    }

    #[test]
    fn truncated_opening_tag_is_ignored() {
        assert!(extract_write_directives("text [WRITE_FIELD:ti").is_empty());
        assert!(!contains_write_directive("text [WRITE_FIELD:title]abc[/WRITE_FI"));
    }

    #[test]
    fn empty_id_is_skipped() {
        let text = "[WRITE_FIELD:]x[/WRITE_FIELD][WRITE_FIELD:ok]y[/WRITE_FIELD]";
        assert_eq!(extract_write_directives(text), vec![write("ok", "y")]);
    }

    #[test]
    fn nested_opener_becomes_part_of_body() {
        let text = "[WRITE_FIELD:a]x [WRITE_FIELD:b]y[/WRITE_FIELD] z[/WRITE_FIELD]";
        assert_eq!(
            extract_write_directives(text),
            vec![write("a", "x [WRITE_FIELD:b]y")]
        );
        assert_eq!(strip_write_directives(text), " z[/WRITE_FIELD]");
    }

    #[test]
    fn multibyte_text_survives_stripping() {
        let text = "héllo [WRITE_FIELD:t]ünïcode ✓[/WRITE_FIELD] wörld";
        assert_eq!(extract_write_directives(text), vec![write("t", "ünïcode ✓")]);
        assert_eq!(strip_write_directives(text), "héllo  wörld");
    }

    #[test]
    fn read_directive_substitutes_value() {
        let out = resolve_read_directives("check [READ_FIELD:title]", |id| {
            (id == "title").then(|| "Hello".to_string())
        });
        assert_eq!(out, "check [Field \"title\" contains: \"Hello\"]");
    }

    #[test]
    fn read_directive_reports_missing_field() {
        let out = resolve_read_directives("check [READ_FIELD:title]", |_| None);
        assert_eq!(out, "check [Field \"title\" not found]");
    }

    #[test]
    fn read_directives_resolve_left_to_right() {
        let mut seen = Vec::new();
        let out = resolve_read_directives("[READ_FIELD:a] and [READ_FIELD:b] [READ_FIELD:]", |id| {
            seen.push(id.to_string());
            Some(id.to_uppercase())
        });
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(
            out,
            "[Field \"a\" contains: \"A\"] and [Field \"b\" contains: \"B\"] [READ_FIELD:]"
        );
    }
}
