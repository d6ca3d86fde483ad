//! Синтез одного фрагмента
//!
//! Ошибка движка не прерывает задание: она превращается в неудачный
//! [`Fragment`], а решение о продолжении принимает [`FailureGovernor`].
//!
//! [`FailureGovernor`]: super::governor::FailureGovernor

use crate::config::Voice;
use crate::engine::{EngineHandle, PronunciationHints, SynthesisRequest};
use crate::text::Chunk;
use crate::utils::naming::truncate_chars;

/// Максимальная длина описания ошибки фрагмента
pub const MAX_ERROR_CHARS: usize = 100;

/// Результат синтеза фрагмента
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    /// 16-битные семплы
    Synthesized(Vec<i16>),
    /// Краткое описание ошибки
    Failed(String),
}

/// Синтезированный фрагмент, живущий до записи на диск
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Номер исходного фрагмента текста
    pub index: usize,
    /// Результат синтеза
    pub outcome: FragmentOutcome,
}

impl Fragment {
    /// Семплы успешного фрагмента
    pub fn samples(&self) -> Option<&[i16]> {
        match &self.outcome {
            FragmentOutcome::Synthesized(samples) => Some(samples),
            FragmentOutcome::Failed(_) => None,
        }
    }
}

/// Переводит семплы с плавающей точкой в 16-битные
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| (s * 32767.0) as i16).collect()
}

/// Синтезирует один фрагмент текста
pub fn synthesize_chunk(engine: &EngineHandle, chunk: &Chunk, voice: Voice, sample_rate: u32) -> Fragment {
    let request = SynthesisRequest {
        text: &chunk.text,
        voice,
        sample_rate,
        hints: PronunciationHints::default(),
    };

    let outcome = match engine.synthesize(&request) {
        Ok(samples) if samples.is_empty() => {
            FragmentOutcome::Failed("engine returned no audio".to_string())
        }
        Ok(samples) if samples.iter().any(|s| !s.is_finite()) => {
            FragmentOutcome::Failed("engine returned non-finite samples".to_string())
        }
        Ok(samples) => FragmentOutcome::Synthesized(quantize(&samples)),
        Err(e) => FragmentOutcome::Failed(truncate_chars(&e.to_string(), MAX_ERROR_CHARS)),
    };

    Fragment {
        index: chunk.index,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, SpeechEngine};

    struct ScriptedEngine;

    impl SpeechEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
            match request.text {
                "ошибка" => Err(EngineError::Rejected("x".repeat(500))),
                "пусто" => Ok(Vec::new()),
                _ => Ok(vec![0.0, 0.5, -1.0, 1.0]),
            }
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            index: 7,
            text: text.to_string(),
            oversized: false,
        }
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(&[0.0, 0.5, -1.0, 1.0]), vec![0, 16383, -32767, 32767]);
        // Значения вне диапазона насыщаются
        assert_eq!(quantize(&[2.0, -2.0]), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_successful_fragment() {
        let engine = EngineHandle::ready(Box::new(ScriptedEngine));
        let fragment = synthesize_chunk(&engine, &chunk("текст"), Voice::Xenia, 48_000);
        assert_eq!(fragment.index, 7);
        assert_eq!(fragment.samples(), Some(&[0, 16383, -32767, 32767][..]));
    }

    #[test]
    fn test_failed_fragment_has_truncated_error() {
        let engine = EngineHandle::ready(Box::new(ScriptedEngine));
        let fragment = synthesize_chunk(&engine, &chunk("ошибка"), Voice::Xenia, 48_000);
        match fragment.outcome {
            FragmentOutcome::Failed(message) => {
                assert_eq!(message.chars().count(), MAX_ERROR_CHARS);
                assert!(message.starts_with("synthesis rejected"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_audio_is_failure() {
        let engine = EngineHandle::ready(Box::new(ScriptedEngine));
        let fragment = synthesize_chunk(&engine, &chunk("пусто"), Voice::Xenia, 48_000);
        assert!(fragment.samples().is_none());
    }
}
