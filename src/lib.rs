/*!
 * # dubsync - subtitle segmentation and dubbing timeline sync
 *
 * Turns a word-timed speech transcript into bilingual subtitles and a
 * timeline of dubbing audio tasks, then assembles rendered clips into one
 * audio track.
 *
 * ## Pipeline
 *
 * 1. Sentence segmentation of the transcript words, speaker-aware
 * 2. Deterministic splitting of oversized sentences
 * 3. Meaning-based splitting through a text-completion service, with
 *    fuzzy recovery of the cut points on the original text
 * 4. Chunked two-pass translation (faithful, then expressive)
 * 5. Subtitle fitting: over-long lines are split on both sides and aligned
 * 6. Duration trimming of lines too long to be spoken in their window
 * 7. Audio task timeline: short entries merged or extended
 * 8. Audio assembly of rendered clips at their start times
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `app_controller`: Stage orchestration, checkpointing and output files
 * - `transcript`: ASR transcript loading
 * - `segmentation`: Sentence records and the three splitters
 * - `translation`: Chunk building and the two-pass translator
 * - `subtitles`: Visual length, fitting, speech rate, trimming and SRT tracks
 * - `timeline`: Audio tasks, speech synthesis and final assembly
 * - `completion`: Validated, rate-limited, cached completion calls
 * - `providers`: Client implementations for the completion services
 * - `prompts`: Prompt templates
 * - `database`: SQLite checkpoints and completion cache
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code and script utilities
 * - `errors`: Custom error types for the application
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod completion;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod prompts;
pub mod providers;
pub mod segmentation;
pub mod subtitles;
pub mod timeline;
pub mod transcript;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, PipelineOutput, PipelineReport};
pub use errors::{AppError, AudioError, CompletionError, FailedUnit, ProviderError, ValidationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use segmentation::SentenceRecord;
pub use subtitles::SubtitleEntry;
pub use timeline::AudioTask;
pub use transcript::{AsrTranscript, TranscriptWord};
pub use translation::TranslationResult;
