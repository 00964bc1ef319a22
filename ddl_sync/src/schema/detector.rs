//! Change detection
//!
//! Scans the text of newly added migration scripts for DDL keyword phrases
//! and collects the objects they touch. This is keyword matching over
//! normalized text, not SQL parsing.

use indexmap::IndexMap;

use crate::db::scripts::Script;
use crate::schema::classifier::{self, KeywordRule};
use crate::schema::types::{ChangeRecord, Disposition, ObjectType};

/// Strip comments, quotes and formatting noise from script text.
///
/// Line (`--`) and block (`/* */`) comments are removed, every whitespace run
/// becomes a single space, double quotes are dropped and the result is
/// lower-cased.
pub fn normalize_script(text: &str) -> String {
    enum State {
        Code,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut pending_space = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                '"' => {}
                c if c.is_whitespace() => pending_space = true,
                c => {
                    if pending_space && !out.is_empty() {
                        out.push(' ');
                    }
                    pending_space = false;
                    out.extend(c.to_lowercase());
                }
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    pending_space = true;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
        }
    }

    out
}

/// Characters that end a word and form a token of their own
const PUNCTUATION: &[char] = &[';', '(', ')', ',', '\''];

/// Split normalized text into words, with statement punctuation as separate tokens
fn tokenize(normalized: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in normalized.char_indices() {
        if c == ' ' || PUNCTUATION.contains(&c) {
            if let Some(s) = start.take() {
                tokens.push(&normalized[s..i]);
            }
            if c != ' ' {
                tokens.push(&normalized[i..i + c.len_utf8()]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&normalized[s..]);
    }

    tokens
}

/// Leading identifier characters of a word (`[A-Za-z0-9_]`)
fn identifier_prefix(word: &str) -> &str {
    let end = word
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(word.len());
    &word[..end]
}

/// A keyword phrase followed by an object name, found in normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub rule: &'static KeywordRule,
    pub name: String,
}

/// Scan normalized script text for keyword phrases.
///
/// At each token the vocabulary is tried in order and the first matching
/// phrase wins; scanning resumes after the phrase and its object name.
/// Punctuation splits tokens, so statements glued by `;` or opened inside a
/// string literal are still seen.
pub fn scan(normalized: &str) -> Vec<KeywordMatch> {
    let words = tokenize(normalized);
    let mut matches = Vec::new();
    let mut i = 0;

    while i < words.len() {
        let Some(rule) = classifier::match_at(&words[i..]) else {
            i += 1;
            continue;
        };
        let width = rule.width();
        let name = words.get(i + width).map(|w| identifier_prefix(w)).unwrap_or("");

        if name.is_empty() {
            tracing::warn!(keyword = rule.phrase, "Keyword is not followed by an object name");
            i += width;
            continue;
        }
        if classifier::is_false_positive_name(name) {
            tracing::debug!(keyword = rule.phrase, "Skipping package body boundary match");
            i += width;
            continue;
        }

        matches.push(KeywordMatch {
            rule,
            name: name.to_string(),
        });
        i += width + 1;
    }

    matches
}

/// Collects change records across scripts
#[derive(Debug, Default)]
pub struct ChangeDetector {
    added: IndexMap<(String, ObjectType), ChangeRecord>,
    dropped: IndexMap<(String, ObjectType), ChangeRecord>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect changes across a batch of scripts.
    ///
    /// Records are deduplicated by name and type keeping the first
    /// occurrence; added records come before dropped ones.
    pub fn detect(scripts: &[Script]) -> Vec<ChangeRecord> {
        let mut detector = Self::new();
        for script in scripts {
            detector.feed(script);
        }
        detector.finish()
    }

    /// Scan one script
    pub fn feed(&mut self, script: &Script) {
        let normalized = normalize_script(&script.content);
        let found = scan(&normalized);
        tracing::debug!(script = %script.name, matches = found.len(), "Scanned script");

        for KeywordMatch { rule, name } in found {
            let classification = rule.classification;
            let record = ChangeRecord::new(&name, classification.object_type, classification.disposition);
            let target = match record.disposition {
                Disposition::Added => &mut self.added,
                Disposition::Dropped => &mut self.dropped,
            };
            target.entry(record.key()).or_insert(record);
        }
    }

    /// Added records followed by dropped records
    pub fn finish(self) -> Vec<ChangeRecord> {
        self.added
            .into_values()
            .chain(self.dropped.into_values())
            .collect()
    }
}
