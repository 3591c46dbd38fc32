//! Section-aware document chunker.
//!
//! Source documents may carry section headers of the form
//!
//! ```text
//! ==========
//! SECTION: Deposits
//! ==========
//! ```
//!
//! The chunker extracts those sections, then greedily packs each section's
//! paragraphs into chunks whose `[<section>]\n\n` prefix plus content stays
//! within [`MAX_CHUNK_CHARS`]. Documents without any header fall back to one
//! chunk per substantial paragraph.
//!
//! # Algorithm
//!
//! 1. [`extract_sections`] scans for headers. Zero headers yields
//!    [`Structure::Unstructured`]. Headers that leave no usable section
//!    (only `END OF DOCUMENT`, or only empty bodies) take the same fallback.
//! 2. Each section body runs from the end of its header to the start of the
//!    next header match. Delimiter residue is stripped and the body trimmed.
//!    `END OF DOCUMENT` sections and empty bodies are dropped.
//! 3. A section that fits with its prefix becomes one chunk. Otherwise its
//!    body is split on blank-line runs and paragraphs are accumulated until the
//!    next one would overflow the budget. Parts are titled `"<name> (<n>)"`
//!    when there is more than one.
//! 4. A single paragraph larger than the budget is kept whole.
//! 5. Unstructured text is split on blank-line runs, inner newlines become
//!    spaces, and paragraphs of at most [`MIN_PARAGRAPH_CHARS`] characters are
//!    discarded. If nothing survives, the whole cleaned text is one chunk.
//!
//! Lengths are counted in UTF-16 code units, so an emoji counts as two. The
//! chunker is pure and deterministic.
//!
//! # Example
//!
//! ```rust
//! use support_kb_core::chunk::chunk_document;
//!
//! let doc = "=====\nSECTION: Fees\n=====\nTrading is free.\n\n=====\nSECTION: END OF DOCUMENT\n=====\n";
//! let chunks = chunk_document(doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].title, "Fees");
//! assert_eq!(chunks[0].embedding_text(), "[Fees]\n\nTrading is free.");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{section_prefix, Chunk};

/// Budget for prefix plus content of a sectioned chunk.
pub const MAX_CHUNK_CHARS: usize = 1600;

/// Unstructured paragraphs must be longer than this to be kept.
pub const MIN_PARAGRAPH_CHARS: usize = 40;

/// Sentinel section name; such sections are never emitted.
pub const END_OF_DOCUMENT: &str = "END OF DOCUMENT";

const PARAGRAPH_JOINER: &str = "\n\n";

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"={5,}\nSECTION:\s*(.+)\n={5,}").expect("section header pattern is valid")
});

static DELIMITER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"={5,}(?:\nSECTION:\s*.+\n={5,}|[ \t]*)").expect("delimiter pattern is valid")
});

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("paragraph break pattern is valid"));

/// Size thresholds used by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLimits {
    pub max_chars: usize,
    pub min_paragraph_chars: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHUNK_CHARS,
            min_paragraph_chars: MIN_PARAGRAPH_CHARS,
        }
    }
}

/// A named region of a document, delimiter markup removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub body: String,
}

/// Outcome of header extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structure {
    /// At least one header was recognized. The list may still be empty if
    /// every section was a sentinel or had no body.
    Sections(Vec<Section>),
    /// No header anywhere in the document.
    Unstructured,
}

struct Header {
    start: usize,
    end: usize,
    name: String,
}

/// Split a document into named sections.
pub fn extract_sections(text: &str) -> Structure {
    let headers: Vec<Header> = HEADER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().trim().to_string();
            Some(Header {
                start: whole.start(),
                end: whole.end(),
                name,
            })
        })
        .collect();

    if headers.is_empty() {
        return Structure::Unstructured;
    }

    let mut sections = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        if header.name == END_OF_DOCUMENT {
            continue;
        }
        let end = headers.get(i + 1).map_or(text.len(), |next| next.start);
        let body = strip_delimiters(&text[header.end..end]);
        if body.is_empty() {
            continue;
        }
        sections.push(Section {
            name: header.name.clone(),
            body,
        });
    }

    Structure::Sections(sections)
}

/// Remove `=====` delimiter lines and whole header blocks, then trim.
pub fn strip_delimiters(text: &str) -> String {
    DELIMITER_RE.replace_all(text, "").trim().to_string()
}

/// Chunk a document with the default [`ChunkLimits`].
pub fn chunk_document(text: &str) -> Vec<Chunk> {
    chunk_document_with(text, &ChunkLimits::default())
}

/// Chunk a document with explicit limits.
///
/// Indices are contiguous from 0. A document with no usable text yields an
/// empty list.
pub fn chunk_document_with(text: &str, limits: &ChunkLimits) -> Vec<Chunk> {
    let mut out = ChunkSink::default();
    match extract_sections(text) {
        Structure::Sections(sections) if !sections.is_empty() => {
            for section in &sections {
                assemble_section(section, limits, &mut out);
            }
        }
        // Headers that left no usable section are treated like no headers.
        Structure::Sections(_) | Structure::Unstructured => {
            assemble_paragraphs(text, limits, &mut out)
        }
    }
    out.chunks
}

#[derive(Default)]
struct ChunkSink {
    chunks: Vec<Chunk>,
}

impl ChunkSink {
    fn push(&mut self, title: String, section: Option<&str>, content: String) {
        self.chunks.push(Chunk {
            index: self.chunks.len(),
            title,
            section: section.map(str::to_string),
            content,
        });
    }
}

fn assemble_section(section: &Section, limits: &ChunkLimits, out: &mut ChunkSink) {
    let name = section.name.as_str();
    let prefix_len = char_len(&section_prefix(name));

    if prefix_len + char_len(&section.body) <= limits.max_chars {
        out.push(name.to_string(), Some(name), section.body.clone());
        return;
    }

    let joiner_len = char_len(PARAGRAPH_JOINER);
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for para in split_paragraphs(&section.body) {
        let para_len = char_len(para);
        if !current.is_empty() && prefix_len + current_len + joiner_len + para_len > limits.max_chars
        {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str(PARAGRAPH_JOINER);
            current_len += joiner_len;
        }
        current.push_str(para);
        current_len += para_len;
    }
    if !current.is_empty() {
        parts.push(current);
    }

    let numbered = parts.len() > 1;
    for (n, content) in parts.into_iter().enumerate() {
        let title = if numbered {
            format!("{} ({})", name, n + 1)
        } else {
            name.to_string()
        };
        out.push(title, Some(name), content);
    }
}

fn assemble_paragraphs(text: &str, limits: &ChunkLimits, out: &mut ChunkSink) {
    let cleaned = strip_delimiters(text);
    let mut paragraphs: Vec<String> = PARAGRAPH_BREAK_RE
        .split(&cleaned)
        .map(|p| p.replace('\n', " ").trim().to_string())
        .filter(|p| char_len(p) > limits.min_paragraph_chars)
        .collect();

    if paragraphs.is_empty() && !cleaned.is_empty() {
        paragraphs.push(cleaned);
    }

    for (i, content) in paragraphs.into_iter().enumerate() {
        out.push(format!("Section {}", i + 1), None, content);
    }
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

fn char_len(s: &str) -> usize {
    s.encode_utf16().count()
}
