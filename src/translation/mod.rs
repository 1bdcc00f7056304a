/*!
 * Chunked two-pass translation of sentence records.
 *
 * - `chunker`: groups sentences into bounded chunks with context
 * - `glossary`: transcript theme and terms shown to every chunk
 * - `translator`: faithful then expressive passes over each chunk
 */

pub use self::chunker::{build_chunks, chunk_context, Chunk};
pub use self::glossary::Glossary;
pub use self::translator::{ChunkTranslator, TranslationOutcome, TranslationResult};

pub mod chunker;
pub mod glossary;
pub mod translator;
