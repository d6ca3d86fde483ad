//! Модуль движка синтеза речи
//!
//! Движок для конвейера является внешней функцией: текст, голос и частота
//! дискретизации на входе, семплы с плавающей точкой на выходе. Модель
//! загружается один раз и разделяется всеми заданиями через [`EngineHandle`].

pub mod command;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::Voice;

pub use command::CommandEngine;

/// Ошибки движка синтеза
#[derive(Debug, Error)]
pub enum EngineError {
    /// Движок отказался озвучивать текст
    #[error("synthesis rejected: {0}")]
    Rejected(String),

    /// Движок недоступен или не инициализирован
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Движок вернул некорректные данные
    #[error("invalid engine output: {0}")]
    InvalidOutput(String),

    /// Ошибка ввода-вывода при обмене с движком
    #[error("engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Подсказки произношения для движка
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PronunciationHints {
    /// Расставлять ударения
    pub put_accent: bool,
    /// Восстанавливать букву «ё»
    pub put_yo: bool,
    /// Ударения в омографах
    pub put_stress_homo: bool,
    /// Буква «ё» в омографах
    pub put_yo_homo: bool,
}

impl Default for PronunciationHints {
    fn default() -> Self {
        Self {
            put_accent: true,
            put_yo: true,
            put_stress_homo: true,
            put_yo_homo: true,
        }
    }
}

/// Запрос на синтез одного фрагмента
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Текст фрагмента
    pub text: &'a str,
    /// Голос диктора
    pub voice: Voice,
    /// Частота дискретизации
    pub sample_rate: u32,
    /// Подсказки произношения
    pub hints: PronunciationHints,
}

/// Трейт движка синтеза речи
pub trait SpeechEngine: Send {
    /// Название движка для журналов
    fn name(&self) -> &str;

    /// Синтезировать речь; семплы в диапазоне [-1.0, 1.0]
    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError>;
}

type EngineFactory = Box<dyn Fn() -> Result<Box<dyn SpeechEngine>, EngineError> + Send + Sync>;

/// Разделяемый дескриптор движка с ленивой инициализацией
///
/// Вызовы движка сериализуются: параллельная работа модели не гарантирована.
pub struct EngineHandle {
    engine: OnceCell<Mutex<Box<dyn SpeechEngine>>>,
    factory: Option<EngineFactory>,
}

impl EngineHandle {
    /// Дескриптор, который создаст движок при первом обращении
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SpeechEngine>, EngineError> + Send + Sync + 'static,
    {
        Self {
            engine: OnceCell::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Дескриптор для уже созданного движка
    pub fn ready(engine: Box<dyn SpeechEngine>) -> Self {
        Self {
            engine: OnceCell::with_value(Mutex::new(engine)),
            factory: None,
        }
    }

    /// Инициализирован ли движок
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    fn get(&self) -> Result<&Mutex<Box<dyn SpeechEngine>>, EngineError> {
        self.engine.get_or_try_init(|| {
            let factory = self
                .factory
                .as_ref()
                .ok_or_else(|| EngineError::Unavailable("no engine factory".to_string()))?;
            log::info!("Initializing speech engine");
            let engine = factory()?;
            log::info!("Speech engine '{}' is ready", engine.name());
            Ok(Mutex::new(engine))
        })
    }

    /// Инициализировать движок заранее
    pub fn warm_up(&self) -> Result<(), EngineError> {
        self.get().map(|_| ())
    }

    /// Синтезировать речь, дождавшись своей очереди к движку
    pub fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
        let engine = self.get()?;
        let mut engine = engine.lock();
        engine.synthesize(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ConstEngine;

    impl SpeechEngine for ConstEngine {
        fn name(&self) -> &str {
            "const"
        }

        fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
            Ok(vec![0.5; request.text.chars().count()])
        }
    }

    fn request(text: &str) -> SynthesisRequest<'_> {
        SynthesisRequest {
            text,
            voice: Voice::Xenia,
            sample_rate: 48_000,
            hints: PronunciationHints::default(),
        }
    }

    #[test]
    fn test_lazy_handle_initializes_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let handle = EngineHandle::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ConstEngine) as Box<dyn SpeechEngine>)
        });

        assert!(!handle.is_initialized());
        assert_eq!(handle.synthesize(&request("абв")).unwrap().len(), 3);
        assert_eq!(handle.synthesize(&request("аб")).unwrap().len(), 2);
        assert!(handle.is_initialized());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_factory_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let handle = EngineHandle::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Unavailable("model missing".to_string()))
        });

        assert!(handle.warm_up().is_err());
        assert!(handle.synthesize(&request("а")).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
