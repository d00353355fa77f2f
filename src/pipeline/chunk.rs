//! Token-bounded, zero-overlap text chunking.
//!
//! ```text
//! text ──▶ normalize ──▶ split on "\n\n" ─too big─▶ "\n" ─▶ " " ─▶ chars
//!                              │
//!                              └──▶ greedy pack into ≤ max_tokens chunks
//! ```
//!
//! Separators stay attached to the piece before them, so the chunks of a text
//! concatenate back to exactly that text. Nothing is dropped and nothing is
//! repeated.

use crate::error::QuizError;
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Split levels tried in order before falling back to characters.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Characters removed by [`normalize_text`].
const INVISIBLE: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

/// Counts tokens the way the generation model does.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// [`TokenCounter`] backed by the `cl100k_base` BPE.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn cl100k() -> Result<Self, QuizError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| QuizError::Tokenizer {
            name: "cl100k_base".into(),
            detail: e.to_string(),
        })?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TiktokenCounter(cl100k_base)")
    }
}

/// Unify line endings, drop invisible characters and trim the ends.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !INVISIBLE.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// One contiguous piece of the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub tokens: usize,
}

impl Chunk {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Splits text into ordered chunks of at most `max_tokens` tokens.
#[derive(Clone)]
pub struct Chunker {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
}

impl Chunker {
    pub fn new(counter: Arc<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens: max_tokens.max(1),
        }
    }

    /// Chunker using the `cl100k_base` tokenizer.
    pub fn tiktoken(max_tokens: usize) -> Result<Self, QuizError> {
        Ok(Self::new(Arc::new(TiktokenCounter::cl100k()?), max_tokens))
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Partition `text` (already normalized) into chunks.
    ///
    /// Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split_recursive(text, 0, &mut pieces);

        let mut chunks = Vec::new();
        self.pack(&pieces, &mut chunks);
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.index = index;
        }
        tracing::debug!(
            "Split {} chars into {} chunk(s) of ≤{} tokens",
            text.len(),
            chunks.len(),
            self.max_tokens
        );
        chunks
    }

    /// Break `text` into pieces that each fit the budget on their own.
    fn split_recursive<'a>(&self, text: &'a str, level: usize, out: &mut Vec<(&'a str, usize)>) {
        let tokens = self.counter.count(text);
        if tokens <= self.max_tokens {
            out.push((text, tokens));
            return;
        }
        match SEPARATORS.get(level) {
            Some(&sep) => {
                let parts: Vec<&str> = text.split_inclusive(sep).collect();
                if parts.len() == 1 {
                    self.split_recursive(text, level + 1, out);
                } else {
                    for part in parts {
                        self.split_recursive(part, level + 1, out);
                    }
                }
            }
            None => self.split_chars(text, out),
        }
    }

    /// Last resort for runs without any separator: bisect on char boundaries.
    fn split_chars<'a>(&self, text: &'a str, out: &mut Vec<(&'a str, usize)>) {
        let tokens = self.counter.count(text);
        let chars = text.chars().count();
        if tokens <= self.max_tokens || chars <= 1 {
            out.push((text, tokens));
            return;
        }
        let mid = text
            .char_indices()
            .nth(chars / 2)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let (left, right) = text.split_at(mid);
        self.split_chars(left, out);
        self.split_chars(right, out);
    }

    /// Greedily merge adjacent pieces while the estimated total fits.
    ///
    /// The estimate is the sum of piece counts. The merged text is counted
    /// again; a group over budget is halved until it fits.
    fn pack(&self, pieces: &[(&str, usize)], out: &mut Vec<Chunk>) {
        let mut start = 0;
        while start < pieces.len() {
            let mut end = start;
            let mut estimate = 0;
            while end < pieces.len() && (end == start || estimate + pieces[end].1 <= self.max_tokens) {
                estimate += pieces[end].1;
                end += 1;
            }
            self.emit(&pieces[start..end], out);
            start = end;
        }
    }

    fn emit(&self, group: &[(&str, usize)], out: &mut Vec<Chunk>) {
        let text: String = group.iter().map(|(p, _)| *p).collect();
        let tokens = if group.len() == 1 {
            group[0].1
        } else {
            self.counter.count(&text)
        };
        if tokens > self.max_tokens && group.len() > 1 {
            let (left, right) = group.split_at(group.len() / 2);
            self.emit(left, out);
            self.emit(right, out);
            return;
        }
        out.push(Chunk {
            index: 0,
            text,
            tokens,
        });
    }
}

impl fmt::Debug for Chunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunker")
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
