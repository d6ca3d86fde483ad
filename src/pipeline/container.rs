//! Модуль временного аудиоконтейнера
//!
//! Этот модуль содержит потоковую запись синтезированных фрагментов во
//! временный WAV-файл. В памяти находится не больше одного фрагмента,
//! файл удаляется при любом завершении задания.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempPath;

use crate::error::{AudiobookError, Result};

use super::adapter::{Fragment, FragmentOutcome};

/// Временный WAV-файл, в который дописываются фрагменты
pub struct RawContainer {
    // Поля удаляются в порядке объявления: сначала закрываем файл, затем удаляем его
    writer: WavWriter<BufWriter<File>>,
    path: TempPath,
    sample_rate: u32,
    written_samples: u64,
    fragments: usize,
}

impl RawContainer {
    /// Создать контейнер `_temp_<stem>_<uuid>.wav` в директории `dir`
    pub fn create(dir: &Path, stem: &str, sample_rate: u32) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let file_name = format!("_temp_{}_{}.wav", stem, uuid::Uuid::new_v4().simple());
        let path = dir.join(file_name);

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&path, spec).map_err(|e| {
            // WavWriter мог успеть создать файл
            let _ = fs::remove_file(&path);
            AudiobookError::Wav(e)
        })?;

        log::debug!("Created raw container {}", path.display());

        Ok(Self {
            writer,
            path: TempPath::from_path(path),
            sample_rate,
            written_samples: 0,
            fragments: 0,
        })
    }

    /// Дописать фрагмент и паузу после него
    ///
    /// Неудачный фрагмент не добавляет ни звука, ни паузы.
    /// Возвращает `true`, если фрагмент был записан.
    pub fn append(&mut self, fragment: &Fragment, pause_samples: usize) -> Result<bool> {
        let samples = match &fragment.outcome {
            FragmentOutcome::Synthesized(samples) => samples,
            FragmentOutcome::Failed(_) => return Ok(false),
        };

        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        for _ in 0..pause_samples {
            self.writer.write_sample(0i16)?;
        }

        self.written_samples += (samples.len() + pause_samples) as u64;
        self.fragments += 1;
        Ok(true)
    }

    /// Путь к временному файлу
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Частота дискретизации
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Количество записанных семплов, включая паузы
    pub fn written_samples(&self) -> u64 {
        self.written_samples
    }

    /// Количество записанных фрагментов
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Закрыть файл для записи
    ///
    /// Если не записано ни одного семпла, контейнер удаляется и
    /// возвращается [`AudiobookError::NoFragments`].
    pub fn finish(self) -> Result<FinishedContainer> {
        let RawContainer {
            writer,
            path,
            sample_rate,
            written_samples,
            fragments,
        } = self;

        writer.finalize()?;

        if written_samples == 0 {
            return Err(AudiobookError::NoFragments);
        }

        Ok(FinishedContainer {
            path,
            sample_rate,
            written_samples,
            fragments,
        })
    }
}

/// Закрытый контейнер, готовый к экспорту
///
/// Файл удаляется, когда значение выходит из области видимости.
#[derive(Debug)]
pub struct FinishedContainer {
    path: TempPath,
    sample_rate: u32,
    written_samples: u64,
    fragments: usize,
}

impl FinishedContainer {
    /// Путь к временному файлу
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Частота дискретизации
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Количество семплов в контейнере
    pub fn written_samples(&self) -> u64 {
        self.written_samples
    }

    /// Количество фрагментов в контейнере
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Длительность в секундах
    pub fn duration_secs(&self) -> f64 {
        self.written_samples as f64 / self.sample_rate as f64
    }
}
