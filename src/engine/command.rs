//! Движок синтеза во внешнем процессе
//!
//! Текст передается в stdin программы, WAV читается из stdout.
//! Голос, частота и подсказки произношения передаются аргументами.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use hound::{SampleFormat, WavReader};

use super::{EngineError, SpeechEngine, SynthesisRequest};

/// Максимальная длина текста ошибки из stderr
const MAX_STDERR_CHARS: usize = 300;

/// Движок, запускающий внешнюю программу синтеза на каждый фрагмент
#[derive(Debug, Clone)]
pub struct CommandEngine {
    /// Путь к программе синтеза
    program: PathBuf,
    /// Дополнительные аргументы перед параметрами запроса
    args: Vec<String>,
}

impl CommandEngine {
    /// Создать новый экземпляр CommandEngine
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Добавить аргументы, передаваемые программе перед параметрами запроса
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Проверить, что программа существует
    pub fn check_available(&self) -> Result<(), EngineError> {
        which::which(&self.program).map(|_| ()).map_err(|e| {
            EngineError::Unavailable(format!("{}: {}", self.program.display(), e))
        })
    }

    fn request_args(request: &SynthesisRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "--speaker".to_string(),
            request.voice.id().to_string(),
            "--sample-rate".to_string(),
            request.sample_rate.to_string(),
        ];
        let hints = request.hints;
        for (enabled, flag) in [
            (hints.put_accent, "--put-accent"),
            (hints.put_yo, "--put-yo"),
            (hints.put_stress_homo, "--put-stress-homo"),
            (hints.put_yo_homo, "--put-yo-homo"),
        ] {
            if enabled {
                args.push(flag.to_string());
            }
        }
        args
    }
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("command")
    }

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(Self::request_args(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("{}: {}", self.program.display(), e)))?;

        // Программа может завершиться, не дочитав текст; причина тогда в stderr
        let write_error = child
            .stdin
            .take()
            .and_then(|mut stdin| stdin.write_all(request.text.as_bytes()).err());

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(EngineError::Rejected(format!("{} ({})", message, output.status)));
        }
        if let Some(e) = write_error {
            return Err(e.into());
        }

        decode_wav(&output.stdout, request.sample_rate)
    }
}

/// Декодирует WAV из памяти в моно семплы с плавающей точкой
pub fn decode_wav(bytes: &[u8], expected_rate: u32) -> Result<Vec<f32>, EngineError> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate != expected_rate {
        return Err(EngineError::InvalidOutput(format!(
            "sample rate {} does not match requested {}",
            spec.sample_rate, expected_rate
        )));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::InvalidOutput(e.to_string()))?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::InvalidOutput(e.to_string()))?,
        (format, bits) => {
            return Err(EngineError::InvalidOutput(format!(
                "unsupported WAV sample format {:?}/{} bits",
                format, bits
            )))
        }
    };

    let channels = spec.channels.max(1) as usize;
    if channels == 1 {
        return Ok(interleaved);
    }

    // Смешиваем каналы в моно
    Ok(interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Voice;
    use crate::engine::PronunciationHints;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(channels: u16, rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let bytes = wav_bytes(1, 48_000, &[0, 16384, -16384]);
        let samples = decode_wav(&bytes, 48_000).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_decode_stereo_wav_is_mixed() {
        let bytes = wav_bytes(2, 48_000, &[16384, 0, -16384, -16384]);
        let samples = decode_wav(&bytes, 48_000).unwrap();
        assert_eq!(samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_decode_rejects_rate_mismatch() {
        let bytes = wav_bytes(1, 24_000, &[0, 1]);
        assert!(matches!(
            decode_wav(&bytes, 48_000),
            Err(EngineError::InvalidOutput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_stderr() {
        let mut engine = CommandEngine::new("sh").with_args(["-c", "echo 'unknown speaker' >&2; exit 3", "sh"]);
        // Текст больше буфера канала, запись упирается в закрытый stdin
        let text = "а".repeat(200_000);
        let request = SynthesisRequest {
            text: &text,
            voice: Voice::Xenia,
            sample_rate: 48_000,
            hints: PronunciationHints::default(),
        };

        match engine.synthesize(&request) {
            Err(EngineError::Rejected(message)) => assert!(message.contains("unknown speaker")),
            other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_request_args() {
        let request = SynthesisRequest {
            text: "Привет",
            voice: Voice::Aidar,
            sample_rate: 48_000,
            hints: PronunciationHints { put_yo_homo: false, ..PronunciationHints::default() },
        };
        let args = CommandEngine::request_args(&request);
        assert_eq!(
            args,
            vec!["--speaker", "aidar", "--sample-rate", "48000", "--put-accent", "--put-yo", "--put-stress-homo"]
        );
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let mut engine = CommandEngine::new("/nonexistent/synth-binary");
        let request = SynthesisRequest {
            text: "Привет",
            voice: Voice::Xenia,
            sample_rate: 48_000,
            hints: PronunciationHints::default(),
        };
        assert!(matches!(engine.synthesize(&request), Err(EngineError::Unavailable(_))));
    }
}
