//! Основной файл библиотеки audiobook-maker
//!
//! Эта библиотека превращает длинные русские тексты в аудиокниги: текст
//! разбивается на фрагменты, фрагменты по очереди озвучиваются движком
//! синтеза и сразу записываются на диск, а готовая запись экспортируется
//! в выбранный формат с тегами. Ход выполнения отслеживается через систему
//! прогресса и уведомлений.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod text;
pub mod utils;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::config::{JobSettings, PipelineConfig, Voice};
use crate::engine::{EngineError, EngineHandle, PronunciationHints, SynthesisRequest};
use crate::error::{AudiobookError, Result};
use crate::pipeline::adapter::quantize;
use crate::pipeline::{CancellationToken, JobFailure, JobLog, JobOutcome, JobStats, SynthesisJob};
use crate::progress::{DefaultProgressReporter, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::report::FileResult;
use crate::text::TextAnalysis;

/// Результат пакетной обработки
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Итоги по каждому файлу в порядке обработки
    pub files: Vec<FileResult>,
    /// Путь к отчету
    pub report: PathBuf,
    /// Путь к архиву, если он создавался
    pub bundle: Option<PathBuf>,
    /// Общее время обработки в секундах
    pub elapsed_secs: f64,
}

impl BatchOutcome {
    /// Количество успешно озвученных файлов
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_done()).count()
    }
}

/// Основная структура для работы с библиотекой
pub struct AudiobookMaker {
    /// Конфигурация конвейера
    config: PipelineConfig,
    /// Движок синтеза, общий для всех заданий
    engine: Arc<EngineHandle>,
    /// Трекер прогресса
    progress_tracker: ProgressTracker,
    /// Флаг отмены текущего задания
    cancellation: Option<CancellationToken>,
}

impl AudiobookMaker {
    /// Создать новый экземпляр с указанной конфигурацией и движком
    pub fn new(config: PipelineConfig, engine: Arc<EngineHandle>) -> Self {
        Self::with_progress_reporter(config, engine, Box::new(DefaultProgressReporter::new()))
    }

    /// Создать новый экземпляр с репортером прогресса
    pub fn with_progress_reporter(
        config: PipelineConfig,
        engine: Arc<EngineHandle>,
        reporter: Box<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            engine,
            progress_tracker: ProgressTracker::with_reporter(reporter),
            cancellation: None,
        }
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress_tracker.add_observer(observer).unwrap_or(0)
    }

    /// Проверять флаг отмены между фрагментами
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = Some(token);
    }

    /// Текущая конфигурация
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Движок синтеза
    pub fn engine(&self) -> &Arc<EngineHandle> {
        &self.engine
    }

    /// Проанализировать текст без синтеза
    pub fn analyze(&self, text: &str) -> TextAnalysis {
        crate::text::analyze_text(text, self.config.max_chunk_chars)
    }

    fn job<'a>(&'a self, settings: &'a JobSettings) -> SynthesisJob<'a> {
        let job = SynthesisJob::new(&self.engine, &self.config, settings).with_progress(&self.progress_tracker);
        match &self.cancellation {
            Some(token) => job.with_cancellation(token.clone()),
            None => job,
        }
    }

    /// Озвучить текст
    pub fn synthesize_text(&self, text: &str, settings: &JobSettings) -> std::result::Result<JobOutcome, JobFailure> {
        log::info!("Starting audiobook synthesis ({} chars)", text.chars().count());
        self.progress_tracker.reset();
        self.job(settings).run(text)
    }

    /// Извлечь текст из документа и озвучить его
    ///
    /// Если название не задано, используется имя файла без расширения.
    pub fn synthesize_file(&self, path: &Path, settings: &JobSettings) -> std::result::Result<JobOutcome, JobFailure> {
        self.progress_tracker.reset();
        self.progress_tracker
            .update_step_progress(0.0, Some(format!("Чтение {}", path.display())));

        let extraction = extract::extract(path);
        for line in extraction.diagnostics.lines() {
            log::debug!("{}: {}", path.display(), line);
        }

        let text = match extraction.into_text(path) {
            Ok(text) if text.trim().is_empty() => return Err(Self::early_failure(AudiobookError::EmptyText)),
            Ok(text) => text,
            Err(error) => return Err(Self::early_failure(error)),
        };
        self.progress_tracker
            .update_step_progress(100.0, Some("Текст извлечен".to_string()));

        let mut settings = settings.clone();
        if settings.title().is_none() {
            settings.title = path.file_stem().map(|stem| stem.to_string_lossy().into_owned());
        }

        self.job(&settings).run(&text)
    }

    fn early_failure(error: AudiobookError) -> JobFailure {
        log::error!("{}", error);
        let mut log = JobLog::new();
        log.extend_raw(&error.diagnostic());
        JobFailure {
            error,
            log,
            stats: JobStats::default(),
        }
    }

    /// Озвучить набор файлов и директорий
    ///
    /// Директории обходятся рекурсивно, берутся только поддерживаемые
    /// форматы. Ошибка одного файла не останавливает обработку остальных.
    pub fn synthesize_batch(
        &self,
        inputs: &[PathBuf],
        settings: &JobSettings,
        make_bundle: bool,
    ) -> Result<BatchOutcome> {
        let started = Instant::now();
        let files = extract::collect_inputs(inputs);
        if files.is_empty() {
            return Err(AudiobookError::InvalidSettings("no supported input files".to_string()));
        }
        log::info!("Processing {} files", files.len());

        let mut results = Vec::with_capacity(files.len());
        let mut artifacts = Vec::new();

        for (i, file) in files.iter().enumerate() {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            log::info!("[{}/{}] {}", i + 1, files.len(), name);

            match self.synthesize_file(file, settings) {
                Ok(outcome) => {
                    artifacts.push(outcome.artifact.path.clone());
                    if let Some(log_path) = &outcome.log_path {
                        artifacts.push(log_path.clone());
                    }
                    results.push(FileResult::succeeded(name, &outcome));
                }
                Err(failure) => {
                    log::warn!("{} failed: {}", name, failure.error);
                    results.push(FileResult::failed(name, &failure));
                }
            }

            if matches!(self.cancellation.as_ref(), Some(token) if token.is_cancelled()) {
                log::warn!("Batch cancelled after {} of {} files", i + 1, files.len());
                break;
            }
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        let report_path = report::write_report(&self.config.output_dir, &results, elapsed_secs, settings)?;
        let bundle_path = if make_bundle {
            Some(report::bundle(&self.config.output_dir, &artifacts, Some(&report_path))?)
        } else {
            None
        };

        Ok(BatchOutcome {
            files: results,
            report: report_path,
            bundle: bundle_path,
            elapsed_secs,
        })
    }

    /// Записать короткое приветствие голосом `voice`
    pub fn preview_voice(&self, voice: Voice) -> Result<PathBuf> {
        let text = format!("Привет! Я {}.", voice.display_name());
        let request = SynthesisRequest {
            text: &text,
            voice,
            sample_rate: self.config.sample_rate,
            hints: PronunciationHints::default(),
        };

        let samples = self.engine.synthesize(&request)?;
        if samples.is_empty() || samples.iter().any(|s| !s.is_finite()) {
            return Err(EngineError::InvalidOutput("preview audio is empty or corrupted".to_string()).into());
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(format!("preview_{}.wav", voice.id()));
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        for sample in quantize(&samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        log::info!("Voice preview saved to {}", path.display());
        Ok(path)
    }
}
