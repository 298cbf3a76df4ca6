//! Corpus loading and the exact-lookup catalog.
//!
//! The corpus is a flat text file of records:
//!
//! ```text
//! ## Title: 1984
//! Winston Smith works at the Ministry of Truth...
//! Main themes: totalitarianism, surveillance
//!
//! ## Title: The Hobbit
//! ...
//! ```
//!
//! `Title: <text>` without the heading marker is accepted too. Blank lines and
//! `---` delimiters between records are ignored.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CorpusError, LibrarianError};
use crate::types::BookRecord;

const SUGGESTION_COUNT: usize = 5;

pub fn load_corpus(path: &Path) -> Result<Vec<BookRecord>, CorpusError> {
    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_corpus(&content)?;
    tracing::info!(
        path = %path.display(),
        count = records.len(),
        "Loaded book summaries"
    );
    Ok(records)
}

pub fn parse_corpus(content: &str) -> Result<Vec<BookRecord>, CorpusError> {
    let mut records: Vec<(String, Vec<&str>)> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim_end();
        if let Some(title) = title_of(line) {
            if title.is_empty() {
                return Err(CorpusError::MissingTitle { line: idx + 1 });
            }
            records.push((title.to_string(), Vec::new()));
            continue;
        }
        // Preamble before the first title is ignored.
        if let Some((_, body)) = records.last_mut() {
            if line.trim() == "---" {
                continue;
            }
            body.push(line);
        }
    }

    let mut books: Vec<BookRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (title, body) in records {
        let summary = body.join("\n").trim().to_string();
        let book = BookRecord::new(title.clone(), summary);
        match positions.get(&title) {
            Some(&pos) => books[pos] = book,
            None => {
                positions.insert(title, books.len());
                books.push(book);
            }
        }
    }

    if books.is_empty() {
        return Err(CorpusError::Empty);
    }
    Ok(books)
}

fn title_of(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("## Title:")
        .or_else(|| trimmed.strip_prefix("Title:"))
        .map(str::trim)
}

/// Title-keyed view of the corpus. Preserves corpus order for listings.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    books: Vec<BookRecord>,
    by_title: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(records: Vec<BookRecord>) -> Self {
        let mut catalog = Self::default();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    /// Same title overwrites in place.
    pub fn insert(&mut self, record: BookRecord) {
        match self.by_title.get(&record.title) {
            Some(&idx) => self.books[idx] = record,
            None => {
                self.by_title.insert(record.title.clone(), self.books.len());
                self.books.push(record);
            }
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get_summary_by_title(&self, title: &str) -> Result<&str, LibrarianError> {
        self.get(title)
            .map(|b| b.summary.as_str())
            .ok_or_else(|| LibrarianError::NotFound(title.to_string()))
    }

    pub fn get(&self, title: &str) -> Option<&BookRecord> {
        self.by_title.get(title).map(|&idx| &self.books[idx])
    }

    pub fn books(&self) -> &[BookRecord] {
        &self.books
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.books.iter().map(|b| b.title.as_str())
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// The message shown to the model (and HTTP callers) for an unknown title.
    pub fn not_found_message(&self, title: &str) -> String {
        let suggestions: Vec<&str> = self.titles().take(SUGGESTION_COUNT).collect();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Available books include: {}...", suggestions.join(", "))
        };
        format!(
            "Sorry, I don't have a detailed summary for '{}'. Please check the title spelling or ask for a different book.{}",
            title, suggestion_text
        )
    }
}
