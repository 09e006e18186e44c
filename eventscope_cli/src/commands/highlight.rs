//! Print the highlighted HTML of a JSON document

use crate::viewer::highlight::{highlight, highlight_value};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

/// Handle highlight command
pub fn run(file: Option<PathBuf>) -> Result<()> {
    let text = match &file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };

    println!("{}", render(&text));
    Ok(())
}

/// Re-indent valid JSON before highlighting; anything else is highlighted as is
fn render(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => highlight_value(&value),
        Err(e) => {
            tracing::debug!("Input is not JSON ({}), highlighting raw text", e);
            highlight(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_reindents_json() {
        assert_eq!(
            render(r#"{"on":true}"#),
            "{\n  <span class=\"key\">\"on\":</span> <span class=\"boolean\">true</span>\n}"
        );
    }

    #[test]
    fn test_render_raw_text() {
        assert_eq!(
            render("a < 1"),
            "a &lt; <span class=\"number\">1</span>"
        );
    }
}
