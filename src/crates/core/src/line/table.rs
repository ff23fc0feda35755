use super::provider::LineProvider;
use super::LocalizedLine;
use crate::dialogue::Line;
use crate::util::lock;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct TableEntry {
    text: String,
    metadata: Vec<String>,
}

/// In-memory string table keyed by line id.
///
/// Substitution markers `{0}`, `{1}`, ... are replaced with the line's substitutions.
#[derive(Debug, Default)]
pub struct TableLineProvider {
    entries: Mutex<HashMap<String, TableEntry>>,
}

impl TableLineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_strings<I, K, V>(strings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let provider = Self::new();
        for (id, text) in strings {
            provider.insert(id, text);
        }
        provider
    }

    pub fn insert(&self, line_id: impl Into<String>, text: impl Into<String>) {
        self.insert_with_metadata(line_id, text, Vec::new());
    }

    pub fn insert_with_metadata(
        &self,
        line_id: impl Into<String>,
        text: impl Into<String>,
        metadata: Vec<String>,
    ) {
        lock(&self.entries).insert(
            line_id.into(),
            TableEntry {
                text: text.into(),
                metadata,
            },
        );
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, line: &Line) -> Option<LocalizedLine> {
        let entry = lock(&self.entries).get(&line.id).cloned()?;
        let text = apply_substitutions(&entry.text, &line.substitutions);
        Some(LocalizedLine::new(line.id.clone(), text).with_metadata(entry.metadata))
    }
}

fn apply_substitutions(template: &str, substitutions: &[String]) -> String {
    substitutions
        .iter()
        .enumerate()
        .fold(template.to_string(), |text, (idx, value)| {
            text.replace(&format!("{{{}}}", idx), value)
        })
}

#[async_trait]
impl LineProvider for TableLineProvider {
    async fn get_localized_line(
        &self,
        line: &Line,
        _cancellation: &CancellationToken,
    ) -> Option<LocalizedLine> {
        let resolved = self.resolve(line);
        if resolved.is_none() {
            debug!("No string table entry for line: line_id={}", line.id);
        }
        resolved
    }
}
