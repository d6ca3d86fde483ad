//! Командная строка audiobook-maker

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use audiobook_maker::config::{JobSettings, OutputFormat, PipelineConfig, Voice};
use audiobook_maker::engine::{CommandEngine, EngineHandle, SpeechEngine};
use audiobook_maker::media::ffmpeg;
use audiobook_maker::notification::ConsoleProgressObserver;
use audiobook_maker::utils::logger;
use audiobook_maker::AudiobookMaker;

/// Озвучивание русских текстов в аудиокниги
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Программа синтеза: читает текст из stdin и пишет WAV в stdout
    #[arg(long, global = true, default_value = "silero-tts")]
    engine: PathBuf,

    /// Дополнительный аргумент программы синтеза (можно повторять)
    #[arg(long = "engine-arg", global = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// JSON-файл конфигурации конвейера
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Директория для итоговых файлов
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Подробный вывод журнала
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Озвучить один документ или текст
    Synth(SynthCommand),

    /// Озвучить несколько файлов и директорий с общим отчетом
    Batch(BatchCommand),

    /// Записать приветствие выбранным голосом
    Preview {
        /// Голос: xenia, baya, kseniya, aidar, eugene
        #[arg(long, value_parser = parse_voice, default_value = "xenia")]
        voice: Voice,
    },

    /// Оценить объем текста без синтеза
    Analyze {
        /// Документ (.txt, .md, .text, .docx, .pages)
        input: PathBuf,
    },

    /// Показать доступные голоса и форматы
    Voices,
}

#[derive(Args, Debug)]
struct SynthCommand {
    /// Документ (.txt, .md, .text, .docx, .pages)
    #[arg(required_unless_present = "text")]
    input: Option<PathBuf>,

    /// Текст для озвучивания вместо файла
    #[arg(long, conflicts_with = "input")]
    text: Option<String>,

    #[command(flatten)]
    job: JobArgs,
}

#[derive(Args, Debug)]
struct BatchCommand {
    /// Файлы и директории
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Упаковать результаты и отчет в ZIP
    #[arg(long)]
    bundle: bool,

    #[command(flatten)]
    job: JobArgs,
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Голос: xenia, baya, kseniya, aidar, eugene
    #[arg(long, value_parser = parse_voice, default_value = "xenia")]
    voice: Voice,

    /// Скорость речи (0.5 - 2.0)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Пауза между предложениями в секундах (0.1 - 2.0)
    #[arg(long, default_value_t = 0.5)]
    pause: f64,

    /// Формат: mp3-128, mp3-192, mp3-320, wav, ogg
    #[arg(long, value_parser = parse_format, default_value = "mp3-192")]
    format: OutputFormat,

    /// Название книги
    #[arg(long)]
    title: Option<String>,

    /// Автор
    #[arg(long)]
    artist: Option<String>,
}

impl JobArgs {
    fn settings(&self) -> JobSettings {
        JobSettings {
            voice: self.voice,
            speed: self.speed,
            pause_secs: self.pause,
            format: self.format,
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

fn parse_voice(id: &str) -> std::result::Result<Voice, String> {
    Voice::from_id(&id.to_lowercase()).ok_or_else(|| format!("unknown voice '{}'", id))
}

fn parse_format(id: &str) -> std::result::Result<OutputFormat, String> {
    OutputFormat::from_id(&id.to_lowercase()).ok_or_else(|| format!("unknown format '{}'", id))
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn engine_handle(cli: &Cli) -> Arc<EngineHandle> {
    let engine = CommandEngine::new(cli.engine.clone()).with_args(cli.engine_args.clone());
    Arc::new(EngineHandle::lazy(move || {
        let engine = engine.clone();
        engine.check_available()?;
        Ok(Box::new(engine) as Box<dyn SpeechEngine>)
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    if let Commands::Voices = cli.command {
        println!("Голоса:");
        for voice in Voice::ALL {
            println!("  {:<8} {}", voice.id(), voice.label());
        }
        println!("Форматы:");
        for format in OutputFormat::ALL {
            println!("  {:<8} {}", format.id(), format.label());
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::debug!("Pipeline config: {:?}", config);
    if let Ok(path) = ffmpeg::locate_ffmpeg(config.ffmpeg_path.as_deref()) {
        match ffmpeg::ffmpeg_version(&path) {
            Ok(version) => log::debug!("Using {}", version),
            Err(e) => log::warn!("Failed to query ffmpeg version: {}", e),
        }
    }

    let mut maker = AudiobookMaker::new(config, engine_handle(&cli));
    maker.add_observer(Box::new(ConsoleProgressObserver::new()));

    match &cli.command {
        Commands::Synth(command) => {
            let settings = command.job.settings();
            let result = match (&command.input, &command.text) {
                (_, Some(text)) => maker.synthesize_text(text, &settings),
                (Some(input), None) => maker.synthesize_file(input, &settings),
                (None, None) => bail!("either an input file or --text is required"),
            };
            eprintln!();
            match result {
                Ok(outcome) => println!("{}", outcome.log.render()),
                Err(failure) => {
                    eprintln!("{}", failure.log.render());
                    return Err(failure).context("synthesis failed");
                }
            }
        }
        Commands::Batch(command) => {
            let settings = command.job.settings();
            let outcome = maker
                .synthesize_batch(&command.inputs, &settings, command.bundle)
                .context("batch processing failed")?;
            eprintln!();
            println!(
                "[INFO]Обработано файлов: {}, успешно: {}",
                outcome.files.len(),
                outcome.succeeded()
            );
            println!("[INFO]Отчет: {}", outcome.report.display());
            if let Some(bundle) = &outcome.bundle {
                println!("[INFO]Архив: {}", bundle.display());
            }
        }
        Commands::Preview { voice } => {
            let path = maker.preview_voice(*voice).context("voice preview failed")?;
            println!("[OK]{}: {}", voice.label(), path.display());
        }
        Commands::Analyze { input } => {
            let text = audiobook_maker::extract::extract_text(input)
                .map_err(|e| anyhow::anyhow!(e.diagnostic()))
                .with_context(|| format!("failed to read {}", input.display()))?;
            println!("{}", maker.analyze(&text).render());
        }
        Commands::Voices => {}
    }

    Ok(())
}
