//! Контроль доли неудачных фрагментов

use serde::Serialize;

use crate::utils::naming::truncate_chars;

use super::adapter::MAX_ERROR_CHARS;

/// Максимальная длина отрывка текста в журнале ошибок
pub const MAX_EXCERPT_CHARS: usize = 80;

/// Запись о неудачном фрагменте
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    /// Номер фрагмента, начиная с единицы
    pub position: usize,
    /// Начало текста фрагмента
    pub excerpt: String,
    /// Краткое описание ошибки
    pub error: String,
}

/// Решение после учета ошибки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Продолжать со следующего фрагмента
    Continue,
    /// Прервать задание
    Abort,
}

/// Следит за долей неудачных фрагментов в рамках одного задания
#[derive(Debug, Clone)]
pub struct FailureGovernor {
    total: usize,
    threshold: f64,
    succeeded: usize,
    failures: Vec<ChunkFailure>,
}

impl FailureGovernor {
    /// Создать контроль для задания из `total` фрагментов
    pub fn new(total: usize, threshold: f64) -> Self {
        Self {
            total,
            threshold,
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    /// Учесть успешный фрагмент
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Учесть неудачный фрагмент и решить, продолжать ли задание
    pub fn record_failure(&mut self, index: usize, text: &str, error: &str) -> Verdict {
        self.failures.push(ChunkFailure {
            position: index + 1,
            excerpt: truncate_chars(text, MAX_EXCERPT_CHARS),
            error: truncate_chars(error, MAX_ERROR_CHARS),
        });

        if self.failures.len() as f64 > self.total as f64 * self.threshold {
            Verdict::Abort
        } else {
            Verdict::Continue
        }
    }

    /// Общее количество фрагментов
    pub fn total(&self) -> usize {
        self.total
    }

    /// Количество успешных фрагментов
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Количество обработанных фрагментов
    pub fn processed(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    /// Количество неудачных фрагментов
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Записи о неудачных фрагментах
    pub fn failures(&self) -> &[ChunkFailure] {
        &self.failures
    }

    /// Забрать записи о неудачных фрагментах
    pub fn into_failures(self) -> Vec<ChunkFailure> {
        self.failures
    }
}
