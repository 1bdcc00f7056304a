/*!
 * Validated access to the text-completion service.
 *
 * - `client`: retrying, cached, rate-limited calls returning typed answers
 * - `rate_limit`: the shared cooldown controller
 * - `retry`: explicit retry schedule and prompt perturbation
 * - `schema`: typed response shapes with pure validators
 * - `json`: JSON extraction from free-form model output
 * - `cache`: response cache with optional durable store
 */

pub mod cache;
pub mod client;
pub mod json;
pub mod rate_limit;
pub mod retry;
pub mod schema;

pub use cache::{CacheStore, ResponseCache};
pub use client::CompletionClient;
pub use rate_limit::RateLimiterContext;
pub use retry::RetryPolicy;
pub use schema::{
    AlignResponse, ExpressiveTranslation, FaithfulTranslation, SplitResponse, SummaryResponse, Term, TrimResponse,
};
