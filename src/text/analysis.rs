//! Анализ текста перед запуском синтеза

use serde::Serialize;

use super::preprocess::preprocess_text;
use super::segmenter::segment;

/// Средняя скорость озвучивания, слов в минуту
const WORDS_PER_MINUTE: f64 = 100.0;

/// Результат анализа текста
#[derive(Debug, Clone, Serialize)]
pub struct TextAnalysis {
    /// Объем текста в мегабайтах (UTF-8)
    pub size_mb: f64,
    /// Количество слов
    pub words: usize,
    /// Количество предложений после нормализации
    pub sentences: usize,
    /// Количество фрагментов для движка
    pub chunks: usize,
    /// Примерное время синтеза в минутах
    pub estimated_minutes: f64,
    /// Можно ли запускать синтез
    pub ready: bool,
}

impl TextAnalysis {
    /// Текстовый отчет об анализе
    pub fn render(&self) -> String {
        if !self.ready {
            return "[ERROR]Введите текст для анализа.".to_string();
        }

        [
            "РЕЗУЛЬТАТЫ АНАЛИЗА".to_string(),
            String::new(),
            format!("Объем текста: {:.2} MB ({} слов)", self.size_mb, self.words),
            format!("Предложений: {}, фрагментов: {}", self.sentences, self.chunks),
            format!("Примерное время синтеза: ~{:.0} мин", self.estimated_minutes),
            String::new(),
            "[OK]Готово к синтезу.".to_string(),
        ]
        .join("\n")
    }
}

/// Анализирует текст без запуска синтеза
pub fn analyze_text(text: &str, max_chunk_chars: usize) -> TextAnalysis {
    if text.trim().is_empty() {
        return TextAnalysis {
            size_mb: 0.0,
            words: 0,
            sentences: 0,
            chunks: 0,
            estimated_minutes: 0.0,
            ready: false,
        };
    }

    let words = text.split_whitespace().count();
    let normalized = preprocess_text(text);
    let chunks = segment(&normalized, max_chunk_chars);
    let sentences = super::segmenter::split_into_sentences(&normalized).len();

    TextAnalysis {
        size_mb: text.len() as f64 / (1024.0 * 1024.0),
        words,
        sentences,
        chunks: chunks.len(),
        estimated_minutes: words as f64 / WORDS_PER_MINUTE,
        ready: !chunks.is_empty(),
    }
}
