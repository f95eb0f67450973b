//! Prompt style library read from a CSV file

use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptStyle {
    pub name: String,
    pub prompt: String,
    pub negative_prompt: String,
}

/// Styles loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct StyleLibrary {
    styles: Vec<PromptStyle>,
}

impl StyleLibrary {
    /// Load `path`; a missing file is an empty library
    pub async fn load(path: &Path) -> Result<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "No styles file");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let styles = parse_styles(&text);
        debug!(path = ?path, count = styles.len(), "Loaded prompt styles");
        Ok(Self { styles })
    }

    pub fn from_styles(styles: Vec<PromptStyle>) -> Self {
        Self { styles }
    }

    pub fn styles(&self) -> &[PromptStyle] {
        &self.styles
    }
}

/// Parse `name,prompt,negative_prompt` rows; columns are located by header
pub fn parse_styles(text: &str) -> Vec<PromptStyle> {
    let mut records = parse_csv(text).into_iter();
    let header = match records.next() {
        Some(header) => header,
        None => return Vec::new(),
    };
    let column = |name: &str| header.iter().position(|h| h.trim() == name);
    let (name_col, prompt_col, negative_col) = match column("name") {
        Some(name_col) => (name_col, column("prompt"), column("negative_prompt")),
        None => {
            warn!("Styles file has no 'name' column");
            return Vec::new();
        }
    };

    let field = |record: &[String], col: Option<usize>| {
        col.and_then(|c| record.get(c)).cloned().unwrap_or_default()
    };

    records
        .filter(|record| record.get(name_col).is_some_and(|n| !n.is_empty()))
        .map(|record| PromptStyle {
            name: record[name_col].clone(),
            prompt: field(&record, prompt_col),
            negative_prompt: field(&record, negative_col),
        })
        .collect()
}

// RFC 4180: quoted fields may contain commas, newlines and doubled quotes.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
