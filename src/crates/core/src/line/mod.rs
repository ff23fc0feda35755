//! Localised line content handed to views
//!
//! `LineProvider` resolves a raw `Line` into presentable text; `TableLineProvider` is the
//! built-in in-memory implementation.

pub mod provider;
pub mod table;

pub use provider::LineProvider;
pub use table::TableLineProvider;

use crate::dialogue::OptionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedLine {
    pub line_id: String,
    /// Text after substitutions, including any character name prefix.
    pub raw_text: String,
    /// Text without the character name.
    pub text: String,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub metadata: Vec<String>,
}

impl LocalizedLine {
    pub fn new(line_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let (character_name, text) = split_character_name(&raw_text);
        Self {
            line_id: line_id.into(),
            text: text.to_string(),
            character_name: character_name.map(str::to_string),
            raw_text,
            metadata: Vec::new(),
        }
    }

    /// Placeholder used when an option's text could not be resolved.
    pub fn missing(line_id: impl Into<String>) -> Self {
        Self {
            line_id: line_id.into(),
            raw_text: String::new(),
            text: String::new(),
            character_name: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_missing(&self) -> bool {
        self.raw_text.is_empty()
    }
}

/// Splits `"Name: text"` into its character name and text.
///
/// A colon preceded by a backslash is literal, and names may not contain whitespace at
/// their edges or be empty.
fn split_character_name(raw: &str) -> (Option<&str>, &str) {
    let bytes = raw.as_bytes();
    for (idx, ch) in raw.char_indices() {
        if ch != ':' {
            continue;
        }
        if idx > 0 && bytes[idx - 1] == b'\\' {
            continue;
        }
        let name = &raw[..idx];
        if name.trim().is_empty() || name.trim() != name {
            return (None, raw);
        }
        return (Some(name), raw[idx + 1..].trim_start());
    }
    (None, raw)
}

/// One presentable choice of an option set. Built fresh for every options event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueOption {
    pub id: OptionId,
    pub text_id: String,
    pub line: LocalizedLine,
    pub is_available: bool,
}
