//! Модуль задания синтеза
//!
//! Этот модуль содержит один проход конвейера: нормализация и разбиение
//! текста, синтез фрагментов по порядку с контролем ошибок, потоковая запись
//! во временный контейнер и экспорт итогового файла. Задание создает свои
//! счетчики и журнал заново и не делит их с другими заданиями.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::{JobSettings, PipelineConfig};
use crate::engine::EngineHandle;
use crate::error::{AudiobookError, Result};
use crate::media::{self, DeliveryArtifact};
use crate::progress::{ProcessStep, ProgressTracker};
use crate::text::{preprocess_text, segment};
use crate::utils::naming::{safe_stem, unique_path};

use super::adapter::{synthesize_chunk, FragmentOutcome};
use super::container::RawContainer;
use super::governor::{ChunkFailure, FailureGovernor, Verdict};

/// Флаг отмены, проверяемый между фрагментами
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запросить отмену задания
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Счетчики одного задания
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    /// Количество фрагментов текста
    pub total_chunks: usize,
    /// Обработано фрагментов
    pub processed: usize,
    /// Неудачных фрагментов
    pub failed: usize,
    /// Фрагментов, попавших в аудио
    pub written: usize,
    /// Время выполнения в секундах
    pub elapsed_secs: f64,
}

impl JobStats {
    /// Процент обработанных фрагментов
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            0.0
        } else {
            self.processed as f64 / self.total_chunks as f64 * 100.0
        }
    }
}

/// Журнал задания: строки с тегами уровня
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobLog {
    lines: Vec<String>,
}

impl JobLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.push("[INFO]", message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.push("[WARN]", message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.push("[ERROR]", message.as_ref());
    }

    pub fn ok(&mut self, message: impl AsRef<str>) {
        self.push("[OK]", message.as_ref());
    }

    /// Добавить строку без тега (продолжение предыдущей записи)
    pub fn detail(&mut self, message: impl AsRef<str>) {
        self.lines.push(message.as_ref().to_string());
    }

    /// Добавить многострочный текст как есть
    pub fn extend_raw(&mut self, text: &str) {
        self.lines.extend(text.lines().map(str::to_string));
    }

    fn push(&mut self, tag: &str, message: &str) {
        self.lines.push(format!("{}{}", tag, message));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// Сохранить журнал в файл
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render() + "\n")?;
        Ok(())
    }
}

/// Результат успешного задания
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Итоговый файл
    pub artifact: DeliveryArtifact,
    /// Журнал задания
    pub log: JobLog,
    /// Счетчики
    pub stats: JobStats,
    /// Неудачные фрагменты, пропущенные в аудио
    pub failures: Vec<ChunkFailure>,
    /// Путь к сохраненному журналу
    pub log_path: Option<PathBuf>,
}

/// Фатальная ошибка задания вместе с журналом и счетчиками
#[derive(Debug, Error)]
#[error("{error}")]
pub struct JobFailure {
    /// Причина
    #[source]
    pub error: AudiobookError,
    /// Журнал задания до момента ошибки
    pub log: JobLog,
    /// Счетчики до момента ошибки
    pub stats: JobStats,
}

impl From<AudiobookError> for JobFailure {
    fn from(error: AudiobookError) -> Self {
        Self {
            error,
            log: JobLog::new(),
            stats: JobStats::default(),
        }
    }
}

/// Одно задание синтеза
pub struct SynthesisJob<'a> {
    engine: &'a EngineHandle,
    config: &'a PipelineConfig,
    settings: &'a JobSettings,
    tracker: Option<&'a ProgressTracker>,
    cancel: Option<CancellationToken>,
}

impl<'a> SynthesisJob<'a> {
    pub fn new(engine: &'a EngineHandle, config: &'a PipelineConfig, settings: &'a JobSettings) -> Self {
        Self {
            engine,
            config,
            settings,
            tracker: None,
            cancel: None,
        }
    }

    /// Сообщать о прогрессе через трекер
    pub fn with_progress(mut self, tracker: &'a ProgressTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Проверять флаг отмены между фрагментами
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Озвучить текст и экспортировать аудиокнигу
    pub fn run(&self, text: &str) -> std::result::Result<JobOutcome, JobFailure> {
        let started = Instant::now();
        let mut log = JobLog::new();
        let mut stats = JobStats::default();
        let mut failures = Vec::new();

        let result = self.execute(text, &mut log, &mut stats, &mut failures);
        stats.elapsed_secs = started.elapsed().as_secs_f64();

        match result {
            Ok(artifact) => {
                log.ok(format!("Готово за {:.1} сек", stats.elapsed_secs));
                log.info(format!(
                    "Длительность: {:.1} сек ({:.1} мин)",
                    artifact.duration_secs,
                    artifact.duration_secs / 60.0
                ));
                log.info(format!("Размер: {:.1} MB", artifact.size_mb()));
                if !failures.is_empty() {
                    log.warn(format!("Пропущено фрагментов: {}", failures.len()));
                }
                let file_name = artifact
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                log.info(format!("Файл: {}", file_name));

                let log_path = if self.config.write_job_log {
                    self.save_log(&log, &artifact.path)
                } else {
                    None
                };

                if let Some(tracker) = self.tracker {
                    tracker.complete();
                }

                Ok(JobOutcome {
                    artifact,
                    log,
                    stats,
                    failures,
                    log_path,
                })
            }
            Err(error) => {
                log::error!("Synthesis job failed: {}", error);
                log.extend_raw(&error.diagnostic());
                Err(JobFailure { error, log, stats })
            }
        }
    }

    fn execute(
        &self,
        text: &str,
        log: &mut JobLog,
        stats: &mut JobStats,
        failures: &mut Vec<ChunkFailure>,
    ) -> Result<DeliveryArtifact> {
        self.settings.validate()?;
        self.config.validate()?;

        if text.trim().is_empty() {
            return Err(AudiobookError::EmptyText);
        }

        self.step(ProcessStep::Segmentation, 0.0, "Разбиение текста");
        let normalized = preprocess_text(text);
        let chunks = segment(&normalized, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err(AudiobookError::NoSentences);
        }
        stats.total_chunks = chunks.len();

        let voice = self.settings.voice;
        let sample_rate = self.config.sample_rate;
        log::info!(
            "Starting synthesis: {} chunks, voice {}, {} Hz",
            chunks.len(),
            voice.id(),
            sample_rate
        );
        log.info(format!("Найдено фрагментов: {}", chunks.len()));
        log.info(format!("Голос: {} ({})", voice.label(), voice.id()));
        log.info(format!("Скорость: {}x", self.settings.speed));
        log.info(format!("Формат: {}", self.settings.format.label()));
        log.detail("");

        let stem = safe_stem(self.settings.title());
        let mut container = RawContainer::create(&self.config.output_dir, &stem, sample_rate)?;
        let pause_samples = self.settings.pause_samples(sample_rate);
        let mut governor = FailureGovernor::new(chunks.len(), self.config.failure_threshold);

        self.step(ProcessStep::Synthesis, 0.0, "Озвучивание");
        let total = chunks.len();

        for chunk in &chunks {
            if self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled) {
                log::warn!("Synthesis cancelled after {} of {} chunks", stats.processed, total);
                log.warn(format!("Синтез отменен после {} из {} фрагментов", stats.processed, total));
                return Err(AudiobookError::Cancelled);
            }

            let fragment = synthesize_chunk(self.engine, chunk, voice, sample_rate);
            match &fragment.outcome {
                FragmentOutcome::Synthesized(_) => {
                    container.append(&fragment, pause_samples)?;
                    governor.record_success();
                    stats.written += 1;
                }
                FragmentOutcome::Failed(error) => {
                    log::warn!("Chunk {}/{} failed: {}", chunk.index + 1, total, error);
                    let verdict = governor.record_failure(chunk.index, &chunk.text, error);
                    if let Some(failure) = governor.failures().last() {
                        log.warn(format!("Ошибка в фрагменте {}/{}: {}", failure.position, total, failure.error));
                        log.detail(format!("   Текст: {}...", failure.excerpt));
                    }
                    stats.failed += 1;

                    if verdict == Verdict::Abort {
                        stats.processed += 1;
                        *failures = governor.into_failures();
                        return Err(AudiobookError::ThresholdExceeded {
                            failed: stats.failed,
                            total,
                        });
                    }
                }
            }
            // Фрагмент освобождается до синтеза следующего
            drop(fragment);

            stats.processed += 1;
            if let Some(tracker) = self.tracker {
                tracker.update_step_progress(
                    stats.processed as f32 / total as f32 * 100.0,
                    Some(format!("Озвучивание {}/{}", stats.processed, total)),
                );
            }
        }

        *failures = governor.into_failures();
        let finished = container.finish()?;
        log.info(format!(
            "Синтезировано фрагментов: {} из {} ({:.1} сек)",
            finished.fragments(),
            total,
            finished.duration_secs()
        ));

        self.step(ProcessStep::Export, 0.0, "Экспорт");
        let dest = unique_path(
            &self.config.output_dir,
            &format!("{}_{}_{}", stem, voice.id(), chrono::Utc::now().timestamp()),
            self.settings.format.extension(),
        );
        let artifact = media::export(finished, self.settings, self.config, &dest)?;

        self.step(ProcessStep::Export, 100.0, "Экспорт завершен");
        log::info!(
            "Synthesis finished: {}/{} chunks, {} failed",
            stats.written,
            total,
            stats.failed
        );
        Ok(artifact)
    }

    fn step(&self, step: ProcessStep, progress: f32, details: &str) {
        if let Some(tracker) = self.tracker {
            tracker.set_step(step);
            tracker.update_step_progress(progress, Some(details.to_string()));
        }
    }

    fn save_log(&self, log: &JobLog, artifact: &Path) -> Option<PathBuf> {
        let path = artifact.with_extension("log.txt");
        match log.write_to(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                log::warn!("Failed to write job log {}: {}", path.display(), e);
                None
            }
        }
    }
}
