//! Модуль для отслеживания прогресса выполнения операций
//!
//! Задание проходит этапы строго по порядку: извлечение текста, разбиение,
//! озвучивание и экспорт. Каждому этапу отведена доля общего прогресса,
//! поэтому общий процент считается как сумма долей пройденных этапов и
//! части текущего. Уведомления не блокируют конвейер и не могут прервать
//! задание.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Этапы процесса создания аудиокниги в порядке выполнения
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    /// Извлечение текста из документа
    Extraction,
    /// Предобработка и разбиение текста
    Segmentation,
    /// Синтез фрагментов
    Synthesis,
    /// Изменение скорости, кодирование и теги
    Export,
}

impl ProcessStep {
    pub const ALL: [ProcessStep; 4] = [Self::Extraction, Self::Segmentation, Self::Synthesis, Self::Export];

    /// Название этапа для пользователя
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extraction => "Извлечение текста",
            Self::Segmentation => "Разбиение текста",
            Self::Synthesis => "Озвучивание",
            Self::Export => "Экспорт",
        }
    }

    /// Доля этапа в общем прогрессе, в процентах
    pub fn weight(&self) -> f32 {
        match self {
            Self::Extraction => 5.0,
            Self::Segmentation => 5.0,
            Self::Synthesis => 80.0,
            Self::Export => 10.0,
        }
    }

    /// Общий прогресс к началу этапа
    fn offset(&self) -> f32 {
        Self::ALL
            .iter()
            .take_while(|step| *step != self)
            .map(ProcessStep::weight)
            .sum()
    }
}

impl std::fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Снимок прогресса, передаваемый наблюдателям
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап
    pub step: ProcessStep,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения задания (0.0 - 100.0)
    pub total_progress: f32,
    /// Подробности, например номер фрагмента
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(step: ProcessStep, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step,
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }

    /// Снимок для этапа `step`, выполненного на `step_progress` процентов
    pub fn at(step: ProcessStep, step_progress: f32, details: Option<String>) -> Self {
        let step_progress = step_progress.clamp(0.0, 100.0);
        let total = step.offset() + step.weight() * step_progress / 100.0;
        Self::new(step, step_progress, total, details)
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Источник уведомлений о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить наблюдателей в порядке добавления
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Репортер, вызывающий наблюдателей синхронно в порядке добавления
#[derive(Default)]
pub struct DefaultProgressReporter {
    observers: Vec<(usize, Box<dyn ProgressObserver>)>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Количество подключенных наблюдателей
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.push((id, observer));
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        let position = self.observers.iter().position(|(observer_id, _)| *observer_id == id)?;
        Some(self.observers.remove(position).1)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for (_, observer) in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Текущий этап и его прогресс
#[derive(Debug, Clone, Copy)]
struct Position {
    step: ProcessStep,
    step_progress: f32,
    finished: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            step: ProcessStep::Extraction,
            step_progress: 0.0,
            finished: false,
        }
    }
}

impl Position {
    fn snapshot(&self, details: Option<String>) -> ProgressInfo {
        if self.finished {
            ProgressInfo::new(self.step, 100.0, 100.0, details)
        } else {
            ProgressInfo::at(self.step, self.step_progress, details)
        }
    }
}

/// Трекер прогресса одного задания
///
/// Переход к следующему этапу засчитывает все предыдущие как завершенные,
/// возврат к более раннему этапу игнорируется.
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    position: RwLock<Position>,
}

impl ProgressTracker {
    /// Трекер без наблюдателей
    pub fn new() -> Self {
        Self {
            reporter: None,
            position: RwLock::new(Position::default()),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            position: RwLock::new(Position::default()),
        }
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя; `None`, если репортер не задан
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    /// Вернуться к началу перед новым заданием
    pub fn reset(&self) {
        *self.position.write() = Position::default();
    }

    /// Перейти к этапу `step`
    pub fn set_step(&self, step: ProcessStep) {
        let snapshot = {
            let mut position = self.position.write();
            if step <= position.step && !position.finished {
                return;
            }
            *position = Position {
                step,
                step_progress: 0.0,
                finished: false,
            };
            position.snapshot(None)
        };
        self.notify(snapshot);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let snapshot = {
            let mut position = self.position.write();
            position.step_progress = progress.clamp(0.0, 100.0);
            position.snapshot(details)
        };
        self.notify(snapshot);
    }

    /// Текущий общий прогресс (0.0 - 100.0)
    pub fn total_progress(&self) -> f32 {
        self.position.read().snapshot(None).total_progress
    }

    /// Отметить завершение задания
    pub fn complete(&self) {
        let snapshot = {
            let mut position = self.position.write();
            position.step_progress = 100.0;
            position.finished = true;
            position.snapshot(Some("Процесс завершен".to_string()))
        };
        self.notify(snapshot);
    }

    fn notify(&self, progress: ProgressInfo) {
        if let Some(reporter) = &self.reporter {
            reporter.notify_progress(progress);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
