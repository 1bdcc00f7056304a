#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{debug, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dubsync::app_config::{self, Config, LlmProvider};
use dubsync::database::{DatabaseConnection, Repository};
use dubsync::errors::AppError;
use dubsync::file_utils::FileManager;
use dubsync::timeline::{render_clips, AudioTask, AudioTimelineAssembler, CommandSynthesizer};
use dubsync::Controller;

/// CLI Wrapper for LlmProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliProvider> for LlmProvider {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Ollama => LlmProvider::Ollama,
            CliProvider::OpenAI => LlmProvider::OpenAI,
            CliProvider::Anthropic => LlmProvider::Anthropic,
            CliProvider::LMStudio => LlmProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment, translate and fit a transcript, then build the dubbing timeline
    Run(RunArgs),

    /// Render one clip per audio task with an external TTS command
    Synthesize(SynthesizeArgs),

    /// Place rendered clips on one audio track
    Assemble(AssembleArgs),

    /// Generate shell completions for dubsync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// ASR transcript JSON
    #[arg(long, value_name = "JSON")]
    transcript: PathBuf,

    /// Directory receiving the SRT tracks, audio_tasks.json and report.json
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Continue a checkpointed run instead of starting a new one
    #[arg(long, value_name = "RUN_ID")]
    resume: Option<String>,

    /// Completion provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Checkpoint database file (defaults to the user data directory)
    #[arg(long, value_name = "FILE", env = "DUBSYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Run without checkpoints or a durable completion cache
    #[arg(long, conflicts_with_all = ["database", "resume"])]
    no_database: bool,

    /// Hide progress bars
    #[arg(long)]
    quiet: bool,
}

#[derive(Parser, Debug)]
struct SynthesizeArgs {
    /// Audio task list written by `run`
    #[arg(long, value_name = "JSON")]
    tasks: PathBuf,

    /// Directory receiving one WAV clip per task
    #[arg(long, value_name = "DIR")]
    clip_dir: PathBuf,

    /// Command template with {text}, {speaker} and {output} placeholders
    #[arg(long, value_name = "TEMPLATE", env = "DUBSYNC_TTS_COMMAND")]
    command: String,

    /// Clips rendered at the same time (defaults to pipeline.max_workers)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    /// Audio task list written by `run`
    #[arg(long, value_name = "JSON")]
    tasks: PathBuf,

    /// Directory holding the rendered clips
    #[arg(long, value_name = "DIR")]
    clip_dir: PathBuf,

    /// Output WAV file
    #[arg(long, value_name = "WAV")]
    output: PathBuf,
}

/// dubsync - subtitle segmentation and dubbing timeline sync
#[derive(Parser, Debug)]
#[command(name = "dubsync")]
#[command(version)]
#[command(about = "Bilingual subtitles and dubbing timelines from speech transcripts")]
#[command(long_about = "dubsync turns a word-timed ASR transcript into bilingual subtitles and a dubbing timeline.

EXAMPLES:
    dubsync run --transcript talk.json -o out/         # Full pipeline with default config
    dubsync run --transcript talk.json --resume <id>   # Continue an interrupted run
    dubsync synthesize --tasks out/audio_tasks.json --clip-dir clips \\
        --command 'tts --text {text} --voice {speaker} --out {output}'
    dubsync assemble --tasks out/audio_tasks.json --clip-dir clips --output dub.wav
    dubsync completions bash > dubsync.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Shortcut for --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append log lines to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
}

impl CommandLineOptions {
    fn cli_log_level(&self) -> Option<app_config::LogLevel> {
        if self.verbose {
            return Some(app_config::LogLevel::Debug);
        }
        self.log_level.clone().map(Into::into)
    }
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), SetLoggerError> {
        let file = log_file.and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = FileManager::ensure_dir(parent);
            }
            OpenOptions::new().create(true).append(true).open(path).ok().map(Mutex::new)
        });
        // The global filter is lowered or raised later through set_max_level
        let logger = Box::new(CustomLogger {
            level: LevelFilter::Trace,
            file,
        });
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, tag) = Self::style_for_level(record.level());

        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{}{} {}\x1B[0m {}", color, now, tag, record.args());

        if let Some(file) = &self.file {
            let _ = writeln!(file.lock(), "{} {} [{}] {}", now, tag, record.target(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CommandLineOptions::parse();

    // Info until the config is loaded, unless the command line says otherwise
    let initial_level = cli.cli_log_level().map(|l| level_filter(&l)).unwrap_or(LevelFilter::Info);
    CustomLogger::init(initial_level, cli.log_file.as_deref())?;

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(*shell, &mut cmd, "dubsync", &mut std::io::stdout());
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_config(&cli, Some(args))?;
            run_pipeline(config, args).await
        }
        Commands::Synthesize(args) => {
            let config = load_config(&cli, None)?;
            synthesize(&config, args).await
        }
        Commands::Assemble(args) => {
            let config = load_config(&cli, None)?;
            assemble(&config, args).await
        }
    }
}

/// Load or create the configuration and apply command line overrides
fn load_config(cli: &CommandLineOptions, run_args: Option<&RunArgs>) -> Result<Config> {
    let config_path = &cli.config_path;
    let mut config = if Path::new(config_path).exists() {
        FileManager::read_json::<Config, _>(config_path)
            .with_context(|| format!("Failed to load config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        FileManager::write_json(config_path, &config)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(args) = run_args {
        if let Some(provider) = &args.provider {
            config.completion.provider = provider.clone().into();
        }
        if let Some(model) = &args.model {
            let provider_str = config.completion.provider.to_lowercase_string();
            if let Some(provider_config) = config
                .completion
                .available_providers
                .iter_mut()
                .find(|p| p.provider_type == provider_str)
            {
                provider_config.model = model.clone();
            }
        }
        if let Some(source_lang) = &args.source_language {
            config.source_language = source_lang.clone();
        }
        if let Some(target_lang) = &args.target_language {
            config.target_language = target_lang.clone();
        }
    }

    if let Some(level) = cli.cli_log_level() {
        config.log_level = level;
    } else {
        log::set_max_level(level_filter(&config.log_level));
    }

    // Audio-only commands never talk to the completion service
    if run_args.is_some() {
        config
            .validate()
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
    }
    Ok(config)
}

async fn run_pipeline(config: Config, args: &RunArgs) -> Result<()> {
    info!(
        "Running {} -> {} with {}",
        config.source_language,
        config.target_language,
        config.completion.provider.display_name()
    );

    let mut controller = Controller::with_config(config)?.with_progress(!args.quiet);
    if !args.no_database {
        let repository = match &args.database {
            Some(path) => Repository::new(DatabaseConnection::new(path)?),
            None => Repository::new_default()?,
        };
        debug!("Checkpoint database: {:?}", repository.connection().path());
        if let Ok(stats) = repository.connection().stats() {
            debug!("{}", stats);
        }
        controller = controller.with_repository(repository);
    }

    let report = controller
        .run_file(&args.transcript, &args.output_dir, args.resume.as_deref())
        .await?;

    if let Some(run_id) = &report.run_id {
        info!("Run id: {} (use --resume {} to continue it)", run_id, run_id);
    }
    let failures = report.failed_chunks.len()
        + report.failed_batches.len()
        + report.failed_alignments.len()
        + report.trim_fallbacks.len();
    if failures > 0 {
        warn!("{} units fell back to a degraded result, see report.json", failures);
    }
    Ok(())
}

async fn synthesize(config: &Config, args: &SynthesizeArgs) -> Result<()> {
    let tasks: Vec<AudioTask> = FileManager::read_json(&args.tasks)?;
    let timeout = Duration::from_secs(config.pipeline.audio.command_timeout_secs);
    let synthesizer = CommandSynthesizer::new(&args.command, timeout)?;
    let workers = args.workers.unwrap_or(config.pipeline.segmentation.max_workers);

    let report = render_clips(&synthesizer, &tasks, &args.clip_dir, workers).await?;
    info!(
        "Rendered {} clips, reused {}, skipped {}, failed {}",
        report.rendered.len(),
        report.reused.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.failed.is_empty() {
        return Err(anyhow!("{} clips failed to render", report.failed.len()));
    }
    Ok(())
}

async fn assemble(config: &Config, args: &AssembleArgs) -> Result<()> {
    let tasks: Vec<AudioTask> = FileManager::read_json(&args.tasks)?;
    let assembler = AudioTimelineAssembler::new(&config.pipeline.audio);

    let report = assembler.assemble(&tasks, &args.clip_dir, &args.output).await?;
    if !report.missing.is_empty() {
        warn!("{} tasks were filled with silence", report.missing.len());
    }
    info!("Wrote {:.1}s of audio to {:?}", report.duration(), args.output);
    Ok(())
}
