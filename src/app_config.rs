use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::completion::Term;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language spoken in the transcript (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language of the subtitles and dub (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Text-completion service config
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Segmentation, fitting and timeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Which languages are written with spaces between words
    #[serde(default)]
    pub languages: LanguageConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Text-completion provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    // @provider: Ollama
    Ollama,
    // @provider: OpenAI
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl LlmProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // @field: Whether the service honours a JSON response format
    #[serde(default = "default_true")]
    pub supports_json: bool,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: LlmProvider) -> Self {
        let (model, endpoint) = match provider_type {
            LlmProvider::Ollama => (default_ollama_model(), default_ollama_endpoint()),
            LlmProvider::OpenAI => (default_openai_model(), default_openai_endpoint()),
            LlmProvider::Anthropic => (default_anthropic_model(), default_anthropic_endpoint()),
            LlmProvider::LMStudio => (default_lmstudio_model(), default_lmstudio_endpoint()),
        };
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            supports_json: provider_type != LlmProvider::Ollama,
        }
    }
}

/// Text-completion service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompletionConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: LlmProvider,

    /// Available providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Settings shared by every provider
    #[serde(default)]
    pub common: CompletionCommonConfig,
}

/// Common completion settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompletionCommonConfig {
    /// Attempts per call before a validation failure becomes terminal
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff between attempts in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for the backoff in milliseconds
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    /// How many rate-limit responses one call may absorb
    #[serde(default = "default_max_rate_limit_waits")]
    pub max_rate_limit_waits: u32,

    /// Reuse successful responses for identical prompts
    #[serde(default = "default_true")]
    pub response_cache: bool,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CompletionCommonConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            max_rate_limit_waits: default_max_rate_limit_waits(),
            response_cache: true,
            temperature: default_temperature(),
        }
    }
}

/// Tuning for every pipeline stage
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub long_sentence: LongSentenceConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub subtitle: SubtitleConfig,

    #[serde(default)]
    pub trim: TrimConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,

    #[serde(default)]
    pub audio: AudioConfig,
}

/// LLM-assisted sentence splitting
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Concurrent completion calls across network-bound stages
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Token budget above which a sentence is sent for meaning splitting
    #[serde(default = "default_max_split_length")]
    pub max_split_length: usize,

    /// Sentences per split request
    #[serde(default = "default_split_batch_size")]
    pub split_batch_size: usize,

    /// Global passes over still-too-long sentences
    #[serde(default = "default_split_passes")]
    pub split_passes: usize,

    /// Ratio below which a recovered split point is reported as low confidence
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_split_length: default_max_split_length(),
            split_batch_size: default_split_batch_size(),
            split_passes: default_split_passes(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Deterministic splitting of oversized sentences
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LongSentenceConfig {
    /// Sentences longer than this many characters are considered
    #[serde(default = "default_char_threshold")]
    pub char_threshold: usize,

    /// Commas closer than this to either end are ignored
    #[serde(default = "default_comma_margin")]
    pub comma_margin: usize,

    /// Halves above this token count are cut into windows
    #[serde(default = "default_hard_cap_tokens")]
    pub hard_cap_tokens: usize,

    /// Tokens per window
    #[serde(default = "default_window_tokens")]
    pub window_tokens: usize,
}

impl Default for LongSentenceConfig {
    fn default() -> Self {
        Self {
            char_threshold: default_char_threshold(),
            comma_margin: default_comma_margin(),
            hard_cap_tokens: default_hard_cap_tokens(),
            window_tokens: default_window_tokens(),
        }
    }
}

/// Chunked translation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Character budget per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Sentence cap per chunk
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,

    /// Trailing lines of the previous chunk shown as context
    #[serde(default = "default_previous_context")]
    pub previous_context: usize,

    /// Leading lines of the next chunk shown as context
    #[serde(default = "default_next_context")]
    pub next_context: usize,

    /// Run the expressive rewrite after the faithful pass
    #[serde(default = "default_true")]
    pub reflect_translate: bool,

    /// Ask for a theme and glossary before translating
    #[serde(default = "default_true")]
    pub summarize: bool,

    /// Characters of transcript sent to the summary call
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Terms with a fixed rendering, always shown when they occur
    #[serde(default)]
    pub custom_terms: Vec<Term>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_sentences: default_max_sentences(),
            previous_context: default_previous_context(),
            next_context: default_next_context(),
            reflect_translate: true,
            summarize: true,
            summary_max_chars: default_summary_max_chars(),
            custom_terms: Vec::new(),
        }
    }
}

/// Per-script reading weights for visual length
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ScriptWeights {
    #[serde(default = "default_cjk_weight")]
    pub cjk: f64,
    #[serde(default = "default_hangul_weight")]
    pub hangul: f64,
    #[serde(default = "default_thai_weight")]
    pub thai: f64,
    #[serde(default = "default_cjk_weight")]
    pub full_width: f64,
}

impl Default for ScriptWeights {
    fn default() -> Self {
        Self {
            cjk: default_cjk_weight(),
            hangul: default_hangul_weight(),
            thai: default_thai_weight(),
            full_width: default_cjk_weight(),
        }
    }
}

/// Subtitle line fitting
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubtitleConfig {
    /// Maximum characters per line
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Multiplier applied to the translation's visual length
    #[serde(default = "default_target_multiplier")]
    pub target_multiplier: f64,

    /// Flag-and-split passes before giving up
    #[serde(default = "default_fit_passes")]
    pub fit_passes: usize,

    #[serde(default)]
    pub weights: ScriptWeights,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            target_multiplier: default_target_multiplier(),
            fit_passes: default_fit_passes(),
            weights: ScriptWeights::default(),
        }
    }
}

/// Over-length trimming
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimConfig {
    /// Entries shorter than this are never trimmed (seconds)
    #[serde(default = "default_min_trim_duration")]
    pub min_trim_duration: f64,

    /// Fastest acceptable speed-up of the synthesized speech
    #[serde(default = "default_max_speed_factor")]
    pub max_speed_factor: f64,

    /// Entries per trim request
    #[serde(default = "default_trim_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub speech_rate: SpeechRateConfig,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            min_trim_duration: default_min_trim_duration(),
            max_speed_factor: default_max_speed_factor(),
            batch_size: default_trim_batch_size(),
            speech_rate: SpeechRateConfig::default(),
        }
    }
}

/// Seconds per spoken unit for duration estimation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SpeechRateConfig {
    // @field: Latin or Cyrillic syllable (vowel group)
    #[serde(default = "default_syllable_secs")]
    pub syllable: f64,

    // @field: Han character, kana or Hangul block
    #[serde(default = "default_cjk_char_secs")]
    pub cjk_char: f64,

    #[serde(default = "default_thai_char_secs")]
    pub thai_char: f64,

    // @field: Pause after , ; : and their full-width forms
    #[serde(default = "default_comma_pause_secs")]
    pub comma_pause: f64,

    // @field: Pause after . ! ? and their full-width forms
    #[serde(default = "default_sentence_pause_secs")]
    pub sentence_pause: f64,
}

impl Default for SpeechRateConfig {
    fn default() -> Self {
        Self {
            syllable: default_syllable_secs(),
            cjk_char: default_cjk_char_secs(),
            thai_char: default_thai_char_secs(),
            comma_pause: default_comma_pause_secs(),
            sentence_pause: default_sentence_pause_secs(),
        }
    }
}

/// Audio task timeline
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimelineConfig {
    /// Minimum duration of an audio task in seconds
    #[serde(default = "default_min_subtitle_duration")]
    pub min_subtitle_duration: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_subtitle_duration: default_min_subtitle_duration(),
        }
    }
}

/// Final audio assembly
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Upper bound on decode threads
    #[serde(default = "default_max_decode_workers")]
    pub max_decode_workers: usize,

    /// Seconds allowed for one external transcode or synthesis command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            max_decode_workers: default_max_decode_workers(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Word separation per language
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageConfig {
    /// Languages whose words are separated by spaces
    #[serde(default = "default_with_space")]
    pub with_space: Vec<String>,

    /// Languages written without spaces between words
    #[serde(default = "default_without_space")]
    pub without_space: Vec<String>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            with_space: default_with_space(),
            without_space: default_without_space(),
        }
    }
}

impl LanguageConfig {
    /// String placed between words when rebuilding text in `language`
    pub fn joiner(&self, language: &str) -> &'static str {
        let matches = |code: &String| crate::language_utils::language_codes_match(code, language);
        if self.without_space.iter().any(matches) {
            ""
        } else {
            " "
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_retry_backoff_max_ms() -> u64 {
    8000
}

fn default_max_rate_limit_waits() -> u32 {
    10
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    4
}

fn default_max_split_length() -> usize {
    20
}

fn default_split_batch_size() -> usize {
    5
}

fn default_split_passes() -> usize {
    3
}

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_char_threshold() -> usize {
    60
}

fn default_comma_margin() -> usize {
    10
}

fn default_hard_cap_tokens() -> usize {
    40
}

fn default_window_tokens() -> usize {
    30
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_sentences() -> usize {
    20
}

fn default_previous_context() -> usize {
    3
}

fn default_next_context() -> usize {
    2
}

fn default_summary_max_chars() -> usize {
    8000
}

fn default_cjk_weight() -> f64 {
    1.75
}

fn default_hangul_weight() -> f64 {
    1.5
}

fn default_thai_weight() -> f64 {
    1.0
}

fn default_max_length() -> usize {
    75
}

fn default_target_multiplier() -> f64 {
    1.2
}

fn default_fit_passes() -> usize {
    3
}

fn default_min_trim_duration() -> f64 {
    3.5
}

fn default_max_speed_factor() -> f64 {
    1.45
}

fn default_trim_batch_size() -> usize {
    10
}

fn default_syllable_secs() -> f64 {
    0.225
}

fn default_cjk_char_secs() -> f64 {
    0.21
}

fn default_thai_char_secs() -> f64 {
    0.08
}

fn default_comma_pause_secs() -> f64 {
    0.15
}

fn default_sentence_pause_secs() -> f64 {
    0.3
}

fn default_min_subtitle_duration() -> f64 {
    2.5
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_decode_workers() -> usize {
    8
}

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_with_space() -> Vec<String> {
    ["en", "es", "fr", "de", "it", "ru", "pt", "ko"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_without_space() -> Vec<String> {
    ["zh", "ja", "th"].iter().map(|s| s.to_string()).collect()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        match self.completion.provider {
            LlmProvider::OpenAI | LlmProvider::Anthropic => {
                if self.completion.get_api_key().is_empty() {
                    return Err(anyhow!(
                        "API key is required for {} provider",
                        self.completion.provider.display_name()
                    ));
                }
            }
            _ => {}
        }

        let pipeline = &self.pipeline;
        if pipeline.segmentation.max_workers == 0 {
            return Err(anyhow!("pipeline.segmentation.max_workers must be at least 1"));
        }
        if pipeline.segmentation.max_split_length == 0 {
            return Err(anyhow!("pipeline.segmentation.max_split_length must be at least 1"));
        }
        if !(0.0..=1.0).contains(&pipeline.segmentation.similarity_threshold) {
            return Err(anyhow!("pipeline.segmentation.similarity_threshold must be within [0, 1]"));
        }
        if pipeline.long_sentence.window_tokens == 0 {
            return Err(anyhow!("pipeline.long_sentence.window_tokens must be at least 1"));
        }
        if pipeline.chunking.chunk_size == 0 || pipeline.chunking.max_sentences == 0 {
            return Err(anyhow!("pipeline.chunking limits must be positive"));
        }
        if pipeline.subtitle.max_length == 0 {
            return Err(anyhow!("pipeline.subtitle.max_length must be positive"));
        }
        if pipeline.trim.max_speed_factor <= 0.0 {
            return Err(anyhow!("pipeline.trim.max_speed_factor must be positive"));
        }
        if pipeline.trim.batch_size == 0 {
            return Err(anyhow!("pipeline.trim.batch_size must be at least 1"));
        }
        if pipeline.timeline.min_subtitle_duration < 0.0 {
            return Err(anyhow!("pipeline.timeline.min_subtitle_duration cannot be negative"));
        }
        if pipeline.audio.sample_rate == 0 {
            return Err(anyhow!("pipeline.audio.sample_rate must be positive"));
        }

        Ok(())
    }

    /// Joiner for the transcript language
    pub fn source_joiner(&self) -> &'static str {
        self.languages.joiner(&self.source_language)
    }

    /// Joiner for the subtitle language
    pub fn target_joiner(&self) -> &'static str {
        self.languages.joiner(&self.target_language)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            completion: CompletionConfig::default(),
            pipeline: PipelineConfig::default(),
            languages: LanguageConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl CompletionConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Active provider settings, falling back to the built-in defaults
    pub fn active_provider(&self) -> ProviderConfig {
        let defaults = ProviderConfig::new(self.provider.clone());
        match self.get_active_provider_config() {
            Some(configured) => ProviderConfig {
                provider_type: defaults.provider_type,
                model: non_empty_or(&configured.model, defaults.model),
                api_key: configured.api_key.clone(),
                endpoint: non_empty_or(&configured.endpoint, defaults.endpoint),
                timeout_secs: configured.timeout_secs,
                max_tokens: configured.max_tokens,
                supports_json: configured.supports_json,
            },
            None => defaults,
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }
}

fn non_empty_or(value: &str, fallback: String) -> String {
    if value.is_empty() {
        fallback
    } else {
        value.to_string()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            available_providers: vec![
                ProviderConfig::new(LlmProvider::OpenAI),
                ProviderConfig::new(LlmProvider::Anthropic),
                ProviderConfig::new(LlmProvider::Ollama),
                ProviderConfig::new(LlmProvider::LMStudio),
            ],
            common: CompletionCommonConfig::default(),
        }
    }
}
