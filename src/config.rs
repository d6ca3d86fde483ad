//! Модуль конфигурации библиотеки audiobook-maker
//!
//! Этот модуль содержит перечисления голосов и форматов, настройки задания
//! синтеза и конфигурацию конвейера.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AudiobookError, Result};

/// Частота дискретизации по умолчанию
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Максимальная длина фрагмента в символах
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 900;

/// Допустимая доля неудачных фрагментов
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 0.3;

/// Допустимый диапазон скорости речи
pub const SPEED_RANGE: (f32, f32) = (0.5, 2.0);

/// Допустимый диапазон паузы между предложениями, в секундах
pub const PAUSE_RANGE: (f64, f64) = (0.1, 2.0);

/// Голос диктора
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    /// Ксения (женский)
    Xenia,
    /// Байя (женский)
    Baya,
    /// Ксения 2 (женский)
    Kseniya,
    /// Айдар (мужской)
    Aidar,
    /// Евгений (мужской)
    Eugene,
}

impl Default for Voice {
    fn default() -> Self {
        Self::Xenia
    }
}

impl Voice {
    /// Все доступные голоса
    pub const ALL: [Voice; 5] = [Self::Xenia, Self::Baya, Self::Kseniya, Self::Aidar, Self::Eugene];

    /// Идентификатор голоса для движка
    pub fn id(&self) -> &'static str {
        match self {
            Self::Xenia => "xenia",
            Self::Baya => "baya",
            Self::Kseniya => "kseniya",
            Self::Aidar => "aidar",
            Self::Eugene => "eugene",
        }
    }

    /// Название голоса для отчетов
    pub fn label(&self) -> &'static str {
        match self {
            Self::Xenia => "Ксения (женский)",
            Self::Baya => "Байя (женский)",
            Self::Kseniya => "Ксения 2 (женский)",
            Self::Aidar => "Айдар (мужской)",
            Self::Eugene => "Евгений (мужской)",
        }
    }

    /// Имя диктора без пометки пола
    pub fn display_name(&self) -> &'static str {
        let label = self.label();
        label.split('(').next().unwrap_or(label).trim()
    }

    /// Найти голос по идентификатору
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

/// Формат итогового файла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MP3 128 kbps
    Mp3_128,
    /// MP3 192 kbps
    Mp3_192,
    /// MP3 320 kbps
    Mp3_320,
    /// WAV без сжатия
    Wav,
    /// OGG Vorbis
    OggVorbis,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Mp3_192
    }
}

impl OutputFormat {
    /// Все доступные форматы
    pub const ALL: [OutputFormat; 5] = [
        Self::Mp3_128,
        Self::Mp3_192,
        Self::Mp3_320,
        Self::Wav,
        Self::OggVorbis,
    ];

    /// Идентификатор формата для командной строки
    pub fn id(&self) -> &'static str {
        match self {
            Self::Mp3_128 => "mp3-128",
            Self::Mp3_192 => "mp3-192",
            Self::Mp3_320 => "mp3-320",
            Self::Wav => "wav",
            Self::OggVorbis => "ogg",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }

    /// Расширение файла, включая точку
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3_128 | Self::Mp3_192 | Self::Mp3_320 => ".mp3",
            Self::Wav => ".wav",
            Self::OggVorbis => ".ogg",
        }
    }

    /// Название формата для отчетов
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mp3_128 => "MP3 (128 kbps)",
            Self::Mp3_192 => "MP3 (192 kbps)",
            Self::Mp3_320 => "MP3 (320 kbps)",
            Self::Wav => "WAV (без сжатия)",
            Self::OggVorbis => "OGG Vorbis",
        }
    }

    /// Сжатый формат, требующий FFmpeg
    pub fn is_lossy(&self) -> bool {
        !matches!(self, Self::Wav)
    }

    /// Параметры кодировщика FFmpeg для формата
    pub fn encoder_args(&self) -> Vec<&'static str> {
        match self {
            Self::Mp3_128 => vec!["-f", "mp3", "-codec:a", "libmp3lame", "-b:a", "128k", "-id3v2_version", "3"],
            Self::Mp3_192 => vec!["-f", "mp3", "-codec:a", "libmp3lame", "-b:a", "192k", "-id3v2_version", "3"],
            Self::Mp3_320 => vec!["-f", "mp3", "-codec:a", "libmp3lame", "-b:a", "320k", "-id3v2_version", "3"],
            Self::OggVorbis => vec!["-f", "ogg", "-codec:a", "libvorbis"],
            Self::Wav => vec!["-f", "wav"],
        }
    }
}

/// Настройки одного задания синтеза
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Голос диктора
    pub voice: Voice,
    /// Множитель скорости речи
    pub speed: f32,
    /// Пауза между предложениями в секундах
    pub pause_secs: f64,
    /// Формат итогового файла
    pub format: OutputFormat,
    /// Название (тег title/album)
    pub title: Option<String>,
    /// Автор (тег artist)
    pub artist: Option<String>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            speed: 1.0,
            pause_secs: 0.5,
            format: OutputFormat::default(),
            title: None,
            artist: None,
        }
    }
}

impl JobSettings {
    /// Проверить диапазоны настроек
    pub fn validate(&self) -> Result<()> {
        if !(SPEED_RANGE.0..=SPEED_RANGE.1).contains(&self.speed) {
            return Err(AudiobookError::InvalidSettings(format!(
                "speed {} is outside {}..={}",
                self.speed, SPEED_RANGE.0, SPEED_RANGE.1
            )));
        }
        if !(PAUSE_RANGE.0..=PAUSE_RANGE.1).contains(&self.pause_secs) {
            return Err(AudiobookError::InvalidSettings(format!(
                "pause {}s is outside {}..={}",
                self.pause_secs, PAUSE_RANGE.0, PAUSE_RANGE.1
            )));
        }
        Ok(())
    }

    /// Название, если оно задано и не пустое
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Автор, если он задан и не пустой
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }

    /// Количество семплов паузы при заданной частоте
    pub fn pause_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * self.pause_secs) as usize
    }
}

/// Конфигурация конвейера синтеза
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Частота дискретизации движка и итогового файла
    pub sample_rate: u32,
    /// Максимальная длина фрагмента в символах
    pub max_chunk_chars: usize,
    /// Доля неудачных фрагментов, после которой задание прерывается
    pub failure_threshold: f64,
    /// Директория для итоговых файлов
    pub output_dir: PathBuf,
    /// Явный путь к FFmpeg
    pub ffmpeg_path: Option<PathBuf>,
    /// Сохранять журнал задания рядом с итоговым файлом
    pub write_job_log: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            output_dir: PathBuf::from("output"),
            ffmpeg_path: None,
            write_job_log: true,
        }
    }
}

impl PipelineConfig {
    /// Загрузить конфигурацию из JSON-файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Применить переопределения из переменных окружения
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("AUDIOBOOK_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(ffmpeg) = std::env::var("AUDIOBOOK_FFMPEG") {
            if !ffmpeg.trim().is_empty() {
                self.ffmpeg_path = Some(PathBuf::from(ffmpeg));
            }
        }
        self
    }

    /// Проверить корректность конфигурации
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudiobookError::InvalidSettings("sample rate must be positive".into()));
        }
        if self.max_chunk_chars == 0 {
            return Err(AudiobookError::InvalidSettings("max chunk length must be positive".into()));
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(AudiobookError::InvalidSettings(format!(
                "failure threshold {} is outside (0, 1]",
                self.failure_threshold
            )));
        }
        Ok(())
    }
}
