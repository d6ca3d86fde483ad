//! Модуль отчетов
//!
//! Этот модуль содержит сводный отчет о пакетной обработке и упаковку
//! итоговых файлов вместе с отчетом в ZIP-архив.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::JobSettings;
use crate::error::Result;
use crate::pipeline::{JobFailure, JobOutcome, JobStats};
use crate::utils::naming::file_timestamp;

const RULE_WIDTH: usize = 70;

/// Итог обработки одного файла
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    /// Аудиокнига создана
    Done,
    /// Обработка завершилась ошибкой
    Failed(String),
}

impl FileStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    fn render(&self) -> String {
        match self {
            Self::Done => "[OK]Готово".to_string(),
            Self::Failed(reason) => format!("[ERROR]{}", reason),
        }
    }
}

/// Строка отчета об одном файле
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    /// Имя исходного файла
    pub name: String,
    /// Статус
    pub status: FileStatus,
    /// Путь к итоговому файлу
    pub artifact: Option<PathBuf>,
    /// Размер итогового файла в байтах
    pub size_bytes: Option<u64>,
    /// Время обработки в секундах
    pub elapsed_secs: f64,
    /// Обработано фрагментов
    pub processed: usize,
    /// Всего фрагментов
    pub total: usize,
    /// Неудачных фрагментов
    pub errors: usize,
}

impl FileResult {
    /// Успешно озвученный файл
    pub fn succeeded(name: impl Into<String>, outcome: &JobOutcome) -> Self {
        Self::from_stats(name, FileStatus::Done, &outcome.stats).with_artifact(
            outcome.artifact.path.clone(),
            outcome.artifact.size_bytes,
        )
    }

    /// Файл, задание для которого завершилось ошибкой
    pub fn failed(name: impl Into<String>, failure: &JobFailure) -> Self {
        Self::from_stats(name, FileStatus::Failed(failure.error.to_string()), &failure.stats)
    }

    fn from_stats(name: impl Into<String>, status: FileStatus, stats: &JobStats) -> Self {
        Self {
            name: name.into(),
            status,
            artifact: None,
            size_bytes: None,
            elapsed_secs: stats.elapsed_secs,
            processed: stats.processed,
            total: stats.total_chunks,
            errors: stats.failed,
        }
    }

    fn with_artifact(mut self, path: PathBuf, size_bytes: u64) -> Self {
        self.artifact = Some(path);
        self.size_bytes = Some(size_bytes);
        self
    }

    fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(|bytes| bytes as f64 / (1024.0 * 1024.0))
    }

    fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Собрать текст отчета
pub fn build_report(files: &[FileResult], elapsed_secs: f64, settings: &JobSettings) -> String {
    let succeeded = files.iter().filter(|f| f.status.is_done()).count();
    let failed = files.len() - succeeded;
    let total_size_mb: f64 = files.iter().filter_map(FileResult::size_mb).sum();
    let total_errors: usize = files.iter().map(|f| f.errors).sum();

    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    let mut lines = vec![
        heavy.clone(),
        "AUDIOBOOK MAKER - ДЕТАЛЬНЫЙ ОТЧЕТ О СИНТЕЗЕ".to_string(),
        heavy.clone(),
        String::new(),
        "ОБЩАЯ СТАТИСТИКА".to_string(),
        light.clone(),
        format!("Дата и время: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Общее время выполнения: {:.2} сек ({:.2} мин)",
            elapsed_secs,
            elapsed_secs / 60.0
        ),
        format!("Всего файлов: {}", files.len()),
        format!("  [OK]Успешно: {}", succeeded),
        format!("  [ERROR]Ошибок: {}", failed),
        format!("Общий размер: {:.2} MB", total_size_mb),
        format!("Количество ошибок при обработке фрагментов: {}", total_errors),
        String::new(),
        "НАСТРОЙКИ СИНТЕЗА".to_string(),
        light.clone(),
        format!("Голос: {}", settings.voice.label()),
        format!("Скорость: {}x", settings.speed),
        format!("Формат: {}", settings.format.label()),
        String::new(),
        "[INFO]ДЕТАЛЬНАЯ ИНФОРМАЦИЯ О ФАЙЛАХ".to_string(),
        light,
    ];

    for (i, file) in files.iter().enumerate() {
        lines.push(format!("\n{}. {}", i + 1, file.name));
        lines.push(format!("   Статус: {}", file.status.render()));
        lines.push(format!("   Прогресс: {:.0}%", file.progress_percent()));
        lines.push(match file.size_mb() {
            Some(mb) => format!("   Размер: {:.2} MB", mb),
            None => "   Размер: -".to_string(),
        });
        lines.push(format!("   Время обработки: {:.1} сек", file.elapsed_secs));
        lines.push(format!("   Обработано фрагментов: {}/{}", file.processed, file.total));
        if file.errors > 0 {
            lines.push(format!("   [WARN]Ошибок: {}", file.errors));
        }
    }

    lines.push(String::new());
    lines.push(heavy.clone());
    lines.push("Сгенерировано Audiobook Maker".to_string());
    lines.push(heavy);

    lines.join("\n")
}

/// Записать отчет `audiobook_log_<время>.txt` в директорию `dir`
pub fn write_report(
    dir: &Path,
    files: &[FileResult],
    elapsed_secs: f64,
    settings: &JobSettings,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("audiobook_log_{}.txt", file_timestamp()));
    fs::write(&path, build_report(files, elapsed_secs, settings))?;
    log::info!("Report written to {}", path.display());
    Ok(path)
}

/// Упаковать итоговые файлы и отчет в `audiobook_bundle_<время>.zip`
///
/// Отсутствующие файлы пропускаются с предупреждением.
pub fn bundle(dir: &Path, artifacts: &[PathBuf], report: Option<&Path>) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("audiobook_bundle_{}.zip", file_timestamp()));
    let mut zip = ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut added = 0;
    for file in artifacts.iter().map(PathBuf::as_path).chain(report) {
        let name = match file.file_name() {
            Some(name) if file.is_file() => name.to_string_lossy().into_owned(),
            _ => {
                log::warn!("Skipping missing file {}", file.display());
                continue;
            }
        };
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
        added += 1;
    }
    zip.finish()?;

    log::info!("Bundled {} files into {}", added, path.display());
    Ok(path)
}
