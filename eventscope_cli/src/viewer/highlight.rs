//! JSON syntax highlighting for the detail view
//!
//! A lexical colorizer: it classifies string, keyword and number tokens but
//! knows nothing about nesting. The HTML form escapes markup characters first
//! and wraps every token in a `<span class="...">`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Quoted strings (with an optional trailing colon), keywords, and numbers
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Word boundaries and digits are ASCII only
    Regex::new(
        r#""(\\u[a-zA-Z0-9]{4}|\\[^u]|[^\\"])*"(\s*:)?|(?-u:\b)(true|false|null)(?-u:\b)|(?-u:\b)[0-9.eE+-]+(?-u:\b)"#,
    )
    .expect("token pattern is a valid regex")
});

/// Token classification, doubling as the CSS class name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Key,
    String,
    Boolean,
    Null,
    Number,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Key => "key",
            TokenClass::String => "string",
            TokenClass::Boolean => "boolean",
            TokenClass::Null => "null",
            TokenClass::Number => "number",
        }
    }

    fn classify(token: &str) -> Self {
        if token.starts_with('"') {
            if token.ends_with(':') {
                TokenClass::Key
            } else {
                TokenClass::String
            }
        } else if token.contains("true") || token.contains("false") {
            TokenClass::Boolean
        } else if token.contains("null") {
            TokenClass::Null
        } else {
            TokenClass::Number
        }
    }
}

/// A run of text, either structural (unclassified) or a classified token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub class: Option<TokenClass>,
}

/// Split text into plain and classified segments, covering the whole input
pub fn tokens(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for m in TOKEN_PATTERN.find_iter(text) {
        if m.start() > last {
            segments.push(Segment {
                text: &text[last..m.start()],
                class: None,
            });
        }
        segments.push(Segment {
            text: m.as_str(),
            class: Some(TokenClass::classify(m.as_str())),
        });
        last = m.end();
    }

    if last < text.len() {
        segments.push(Segment {
            text: &text[last..],
            class: None,
        });
    }

    segments
}

/// Escape the characters that could break the surrounding markup
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Pretty-print a JSON value with 2-space indentation
pub fn pretty(value: &Value) -> String {
    // Serializing a Value cannot fail: keys are always strings
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Display text for a value: strings as is, anything else pretty-printed
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => pretty(other),
    }
}

/// Highlight JSON text as HTML
pub fn highlight(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len() * 2);

    for segment in tokens(&escaped) {
        match segment.class {
            Some(class) => {
                out.push_str("<span class=\"");
                out.push_str(class.as_str());
                out.push_str("\">");
                out.push_str(segment.text);
                out.push_str("</span>");
            }
            None => out.push_str(segment.text),
        }
    }

    out
}

/// Highlight a JSON value, pretty-printing it first unless it is already text
pub fn highlight_value(value: &Value) -> String {
    highlight(&display_text(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escapes_and_wraps_key_and_string() {
        let html = highlight(r#"{"a":"b<c"}"#);
        assert_eq!(
            html,
            r#"{<span class="key">"a":</span><span class="string">"b&lt;c"</span>}"#
        );

        // No raw markup characters outside of our own tags
        let stripped = html
            .replace("<span class=\"key\">", "")
            .replace("<span class=\"string\">", "")
            .replace("</span>", "");
        assert!(!stripped.contains('<'));
        assert!(!stripped.contains('>'));
        assert!(!stripped.replace("&lt;", "").contains('&'));
    }

    #[test]
    fn test_classifies_literals() {
        let html = highlight(r#"[true, false, null, 12.5, -3, 1e10]"#);
        assert!(html.contains(r#"<span class="boolean">true</span>"#));
        assert!(html.contains(r#"<span class="boolean">false</span>"#));
        assert!(html.contains(r#"<span class="null">null</span>"#));
        assert!(html.contains(r#"<span class="number">12.5</span>"#));
        assert!(html.contains(r#"-<span class="number">3</span>"#));
        assert!(html.contains(r#"<span class="number">1e10</span>"#));
        // Structural characters are left alone
        assert!(html.starts_with('['));
        assert!(html.ends_with(']'));
    }

    #[test]
    fn test_boundaries_ignore_non_ascii_letters() {
        assert_eq!(highlight("é1"), r#"é<span class="number">1</span>"#);
        assert_eq!(highlight("ünull"), r#"ü<span class="null">null</span>"#);
        // Non-ASCII digits are plain text
        assert_eq!(highlight("٣"), "٣");
    }

    #[test]
    fn test_key_with_whitespace_before_colon() {
        let html = highlight("{\"name\" : \"x\"}");
        assert!(html.contains(r#"<span class="key">"name" :</span>"#));
    }

    #[test]
    fn test_escaped_quotes_stay_inside_string() {
        let html = highlight(r#"{"q":"say \"hi\""}"#);
        assert!(html.contains(r#"<span class="string">"say \"hi\""</span>"#));
    }

    #[test]
    fn test_escape_applied_once_per_call() {
        assert_eq!(highlight("&lt;"), "&amp;lt;");

        let once = highlight(r#"{"a":"<"}"#);
        let twice = highlight(&once);
        assert!(twice.contains("&amp;lt;"));
        assert!(!twice.contains("&amp;amp;"));
        assert!(twice.contains("&lt;span class="));
    }

    #[test]
    fn test_highlight_value_pretty_prints() {
        let html = highlight_value(&json!({"a": [1, true]}));
        assert_eq!(
            html,
            "{\n  <span class=\"key\">\"a\":</span> [\n    <span class=\"number\">1</span>,\n    <span class=\"boolean\">true</span>\n  ]\n}"
        );

        // Text values are highlighted verbatim
        let html = highlight_value(&json!("{\"raw\":1}"));
        assert_eq!(html, r#"{<span class="key">"raw":</span><span class="number">1</span>}"#);
    }

    #[test]
    fn test_tokens_cover_input() {
        let text = r#"{"k": [null, "v"]}"#;
        let segments = tokens(text);
        let joined: String = segments.iter().map(|s| s.text).collect();
        assert_eq!(joined, text);

        let classes: Vec<_> = segments.iter().filter_map(|s| s.class).collect();
        assert_eq!(
            classes,
            vec![TokenClass::Key, TokenClass::Null, TokenClass::String]
        );
    }
}
