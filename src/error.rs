//! Модуль обработки ошибок библиотеки audiobook-maker
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при синтезе,
//! а также классификацию фатальных ошибок для понятной диагностики.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

/// Категория фатальной ошибки, показываемая пользователю
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Проблемы с кодировкой или форматом входного файла
    Encoding,
    /// Нехватка ресурсов: память, диск, внешние программы
    Resource,
    /// Текст, который движок не смог озвучить
    MalformedContent,
    /// Все остальное
    Generic,
}

/// Ошибки библиотеки audiobook-maker
#[derive(Debug, Error)]
pub enum AudiobookError {
    /// Пустой текст
    #[error("input text is empty")]
    EmptyText,

    /// Текст не содержит ни одного предложения
    #[error("input text contains no sentences")]
    NoSentences,

    /// Не удалось извлечь текст из документа
    #[error("failed to extract text from {}", path.display())]
    Extraction {
        /// Путь к документу
        path: PathBuf,
        /// Диагностика извлечения, строки с тегами уровня
        diagnostics: Vec<String>,
    },

    /// Неподдерживаемый формат документа
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Неверные настройки задания или конфигурации
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Превышен допустимый процент неудачных фрагментов
    #[error("too many failed fragments ({failed}/{total})")]
    ThresholdExceeded {
        /// Количество неудачных фрагментов
        failed: usize,
        /// Общее количество фрагментов
        total: usize,
    },

    /// Не синтезировано ни одного фрагмента
    #[error("no fragments synthesized")]
    NoFragments,

    /// Задание отменено вызывающей стороной
    #[error("job cancelled")]
    Cancelled,

    /// Ошибка экспорта итогового файла
    #[error("export error: {0}")]
    Export(String),

    /// FFmpeg не найден
    #[error("ffmpeg executable not found")]
    FfmpegNotFound,

    /// Ошибка движка синтеза вне цикла фрагментов (например, при инициализации)
    #[error("speech engine error: {0}")]
    Engine(#[from] EngineError),

    /// Ошибка ресемплинга
    #[error("resampling error: {0}")]
    Resample(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка чтения или записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка работы с ZIP-архивом
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AudiobookError {
    /// Категория ошибки для пользовательской диагностики
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Extraction { .. } | Self::UnsupportedFormat(_) => ErrorCategory::Encoding,
            Self::ThresholdExceeded { .. } | Self::NoFragments | Self::NoSentences => {
                ErrorCategory::MalformedContent
            }
            Self::FfmpegNotFound | Self::Io(_) | Self::Engine(EngineError::Unavailable(_)) => {
                ErrorCategory::Resource
            }
            _ => ErrorCategory::Generic,
        }
    }

    /// Понятное пользователю описание ошибки с рекомендациями
    pub fn diagnostic(&self) -> String {
        match self {
            Self::EmptyText => "[ERROR]Введите текст для озвучивания.".to_string(),
            Self::NoSentences => "[ERROR]Текст не содержит предложений.".to_string(),
            Self::Extraction { diagnostics, .. } => format!(
                "[ERROR]Не удалось извлечь текст из файла.\n\n[DEBUG]Диагностика:\n{}",
                diagnostics.join("\n")
            ),
            Self::UnsupportedFormat(ext) => format!("[ERROR]Неподдерживаемый формат: {}", ext),
            Self::ThresholdExceeded { failed, total } => format!(
                "[ERROR]Критическая ошибка: слишком много неудачных фрагментов ({}/{})\n\
                 Возможные причины:\n\
                 • Текст содержит некорректные символы\n\
                 • Недостаточно памяти\n\n\
                 Попробуйте:\n\
                 • Разделить текст на части\n\
                 • Проверить кодировку файла",
                failed, total
            ),
            Self::NoFragments => {
                "[ERROR]Не удалось синтезировать ни одного фрагмента.".to_string()
            }
            Self::Cancelled => "[WARN]Синтез отменен.".to_string(),
            Self::FfmpegNotFound => "[ERROR]FFmpeg не найден. Установите FFmpeg или выберите формат WAV."
                .to_string(),
            other => match other.category() {
                ErrorCategory::Resource => format!(
                    "[ERROR]Недостаточно ресурсов: {}\nПроверьте свободное место на диске и доступную память.",
                    other
                ),
                _ => format!("[ERROR]Ошибка: {}", other),
            },
        }
    }
}

impl From<rubato::ResampleError> for AudiobookError {
    fn from(e: rubato::ResampleError) -> Self {
        AudiobookError::Resample(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for AudiobookError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudiobookError::Resample(e.to_string())
    }
}

/// Тип Result для библиотеки audiobook-maker
pub type Result<T> = std::result::Result<T, AudiobookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_diagnostic_mentions_counts_and_remedies() {
        let err = AudiobookError::ThresholdExceeded { failed: 4, total: 10 };
        let text = err.diagnostic();
        assert!(text.contains("(4/10)"));
        assert!(text.contains("Проверить кодировку файла"));
        assert_eq!(err.category(), ErrorCategory::MalformedContent);
    }

    #[test]
    fn test_extraction_diagnostic_is_verbatim() {
        let err = AudiobookError::Extraction {
            path: PathBuf::from("book.pages"),
            diagnostics: vec!["[WARN]a".to_string(), "[ERROR]b".to_string()],
        };
        assert!(err.diagnostic().ends_with("[WARN]a\n[ERROR]b"));
        assert_eq!(err.category(), ErrorCategory::Encoding);
    }
}
