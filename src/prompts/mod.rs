/*!
 * Prompt construction for splitting, summarizing, translation, alignment and trimming.
 */

pub mod templates;

pub use templates::{
    align_prompt, expressive_prompt, faithful_prompt, split_prompt, summary_prompt, trim_prompt, ChunkContext,
    ExpressiveItem, PromptTemplate, SplitItem, TrimItem,
};
