//! Character sliding-window chunker.
//!
//! Splits the concatenated text of a document into [`Chunk`]s of at most
//! `chunk_size` characters, where consecutive chunks share `chunk_overlap`
//! characters. Boundaries are purely size-based; paragraphs and sentences
//! are not respected.
//!
//! # Algorithm
//!
//! 1. Index the text by char (not byte) so multi-byte text never splits
//!    inside a code point.
//! 2. Emit the window `[start, start + chunk_size)`, clamped to the end.
//! 3. Advance `start` to `end - chunk_overlap` until the end is reached.
//!
//! With `chunk_overlap == 0` the chunks concatenate back to the input.
//!
//! Chunk ids are UUIDv5 values derived from `document_id` and the chunk
//! index, so the same text always produces the same chunk sequence.
//!
//! ```rust
//! use docqa::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc", "abcdefghij", &[0], 4, 1);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split `text` into overlapping fixed-size chunks.
///
/// `page_starts` holds the char offset at which each page begins (first
/// entry `0`), and is used to tag each chunk with its starting page.
/// Whitespace-only text yields no chunks.
///
/// The caller guarantees `chunk_overlap < chunk_size` (validated when the
/// settings are loaded); an overlap that large is clamped so the window
/// always advances.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    page_starts: &[usize],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let char_len = bounds.len() - 1;

    let step = chunk_size - chunk_overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(char_len);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(
            document_id,
            index,
            page_for(page_starts, start),
            start,
            piece,
        ));
        index += 1;

        if end == char_len {
            break;
        }
        start += step;
    }

    chunks
}

/// 1-based page containing char offset `pos`.
fn page_for(page_starts: &[usize], pos: usize) -> u32 {
    let pages_started = page_starts.partition_point(|&s| s <= pos);
    pages_started.max(1) as u32
}

fn make_chunk(document_id: &str, index: i64, page: u32, start: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let name = format!("{}:{}", document_id, index);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes());

    Chunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        page,
        start_char: start,
        text: text.to_string(),
        hash,
    }
}
