/*!
 * Packing sentences into translation chunks.
 */

use crate::app_config::ChunkingConfig;
use crate::segmentation::SentenceRecord;

/// A run of consecutive sentences translated in one call
///
/// `labeled` holds the `[speaker]: text` lines sent to the service; the
/// records themselves are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub records: Vec<SentenceRecord>,
    pub labeled: Vec<String>,
}

impl Chunk {
    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// `(id, labeled line)` pairs for the prompt
    pub fn lines(&self) -> Vec<(u64, String)> {
        self.records
            .iter()
            .zip(&self.labeled)
            .map(|(record, line)| (record.id, line.clone()))
            .collect()
    }
}

/// Line as shown to the translator, with the speaker prefix when known
pub fn labeled_line(record: &SentenceRecord) -> String {
    match &record.speaker_id {
        Some(speaker) => format!("[{}]: {}", speaker, record.text),
        None => record.text.clone(),
    }
}

/// Greedy packing bounded by characters and sentence count
///
/// A chunk is closed when adding the next labeled line (plus newline) would
/// exceed `chunk_size` characters or it already holds `max_sentences`.
/// A single line longer than the budget still gets a chunk of its own.
pub fn build_chunks(records: &[SentenceRecord], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<SentenceRecord> = Vec::new();
    let mut labeled: Vec<String> = Vec::new();
    let mut char_count = 0;

    for record in records {
        let line = labeled_line(record);
        let line_chars = line.chars().count() + 1;
        let full = char_count + line_chars > config.chunk_size || current.len() >= config.max_sentences.max(1);
        if full && !current.is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                records: std::mem::take(&mut current),
                labeled: std::mem::take(&mut labeled),
            });
            char_count = 0;
        }
        current.push(record.clone());
        labeled.push(line);
        char_count += line_chars;
    }
    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            records: current,
            labeled,
        });
    }
    chunks
}

/// Read-only neighbour lines for chunk `index`
///
/// The last `previous_context` lines of the chunk before and the first
/// `next_context` lines of the chunk after; `None` at either end.
pub fn chunk_context<'a>(
    chunks: &'a [Chunk],
    index: usize,
    config: &ChunkingConfig,
) -> (Option<&'a [String]>, Option<&'a [String]>) {
    let previous = index.checked_sub(1).and_then(|i| chunks.get(i)).map(|chunk| {
        let skip = chunk.labeled.len().saturating_sub(config.previous_context);
        &chunk.labeled[skip..]
    });
    let next = chunks.get(index + 1).map(|chunk| {
        let take = config.next_context.min(chunk.labeled.len());
        &chunk.labeled[..take]
    });
    (previous, next)
}
