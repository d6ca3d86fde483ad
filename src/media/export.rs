//! Модуль экспорта итогового файла
//!
//! Этот модуль читает временный контейнер блоками, при необходимости меняет
//! скорость речи и передает звук в приемник выбранного формата: WAV
//! записывается напрямую, форматы с потерями кодируются FFmpeg, который
//! получает PCM через stdin.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;

use crate::config::{JobSettings, OutputFormat, PipelineConfig};
use crate::error::{AudiobookError, Result};
use crate::pipeline::container::FinishedContainer;
use crate::utils::naming::truncate_chars;

use super::audio::{f32_to_i16, i16_to_f32, SpeedTransform, BLOCK_SIZE};
use super::ffmpeg::locate_ffmpeg;
use super::tags::{append_info_chunk, Tags};

/// Количество семплов, читаемых из контейнера за раз
const READ_BLOCK: usize = 4 * BLOCK_SIZE;

/// Итоговый файл аудиокниги
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryArtifact {
    /// Путь к файлу
    pub path: PathBuf,
    /// Формат файла
    pub format: OutputFormat,
    /// Длительность в секундах
    pub duration_secs: f64,
    /// Размер в байтах
    pub size_bytes: u64,
    /// Количество кадров звука
    pub frames: u64,
}

impl DeliveryArtifact {
    /// Размер в мегабайтах
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Приемник 16-битного моно PCM
pub trait AudioSink {
    /// Записать очередной блок семплов
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Закончить запись и закрыть файл
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Прямая запись WAV с тегами LIST/INFO
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    tags: Tags,
}

impl WavSink {
    /// Создать WAV-файл по пути `path`
    pub fn create(path: &Path, sample_rate: u32, tags: Tags) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            writer: WavWriter::create(path, spec)?,
            path: path.to_path_buf(),
            tags,
        })
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let WavSink { writer, path, tags } = *self;
        writer.finalize()?;
        append_info_chunk(&path, &tags)
    }
}

/// Кодирование через FFmpeg, PCM s16le передается в stdin
pub struct FfmpegSink {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
    buffer: Vec<u8>,
}

impl FfmpegSink {
    /// Запустить FFmpeg для записи в `dest`
    pub fn spawn(
        ffmpeg: &Path,
        format: OutputFormat,
        sample_rate: u32,
        tags: &Tags,
        dest: &Path,
    ) -> Result<Self> {
        let rate = sample_rate.to_string();
        let mut command = Command::new(ffmpeg);
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "s16le", "-ar", rate.as_str(), "-ac", "1", "-i", "pipe:0"])
            .args(format.encoder_args())
            .args(tags.ffmpeg_args())
            .arg(dest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        log::debug!("Running {:?}", command);

        let mut child = command.spawn().map_err(|e| {
            AudiobookError::Export(format!("failed to start {}: {}", ffmpeg.display(), e))
        })?;

        let stdin = child.stdin.take().map(BufWriter::new);
        // stderr читается в отдельном потоке, чтобы FFmpeg не заблокировался на полном буфере
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        Ok(Self {
            child,
            stdin,
            stderr,
            buffer: Vec::with_capacity(READ_BLOCK * 2),
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|text| truncate_chars(text.trim(), 300))
            .unwrap_or_default()
    }
}

impl AudioSink for FfmpegSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AudiobookError::Export("ffmpeg input is closed".to_string()))?;

        self.buffer.clear();
        for &sample in samples {
            self.buffer.extend_from_slice(&sample.to_le_bytes());
        }

        if let Err(e) = stdin.write_all(&self.buffer) {
            self.stdin = None;
            let _ = self.child.wait();
            let stderr = self.collect_stderr();
            return Err(AudiobookError::Export(format!("ffmpeg stopped reading input ({}): {}", e, stderr)));
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }

        let status = self.child.wait()?;
        let stderr = self.collect_stderr();

        if !status.success() {
            return Err(AudiobookError::Export(format!(
                "ffmpeg exited with status {}: {}",
                status, stderr
            )));
        }
        if !stderr.is_empty() {
            log::warn!("ffmpeg: {}", stderr);
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Закрытие stdin завершает FFmpeg, если запись прервалась
        self.stdin = None;
        let _ = self.child.wait();
    }
}

/// Открыть приемник для формата задания
fn open_sink(
    settings: &JobSettings,
    config: &PipelineConfig,
    sample_rate: u32,
    dest: &Path,
) -> Result<Box<dyn AudioSink>> {
    let tags = Tags::from_settings(settings);
    if settings.format.is_lossy() {
        let ffmpeg = locate_ffmpeg(config.ffmpeg_path.as_deref())?;
        Ok(Box::new(FfmpegSink::spawn(&ffmpeg, settings.format, sample_rate, &tags, dest)?))
    } else {
        Ok(Box::new(WavSink::create(dest, sample_rate, tags)?))
    }
}

/// Перекодировать контейнер в приемник, вернуть количество кадров
fn transcode(container: &FinishedContainer, speed: f32, sink: &mut dyn AudioSink) -> Result<u64> {
    let mut reader = WavReader::open(container.path())?;
    let mut samples = reader.samples::<i16>();
    let mut block: Vec<i16> = Vec::with_capacity(READ_BLOCK);

    let mut transform = if (speed - 1.0).abs() > f32::EPSILON {
        Some(SpeedTransform::new(speed)?)
    } else {
        None
    };
    let mut input = Vec::with_capacity(READ_BLOCK);
    let mut output = Vec::with_capacity(READ_BLOCK * 2);
    let mut converted = Vec::with_capacity(READ_BLOCK * 2);
    let mut frames = 0u64;

    loop {
        block.clear();
        for sample in samples.by_ref().take(READ_BLOCK) {
            block.push(sample?);
        }
        if block.is_empty() {
            break;
        }

        match transform.as_mut() {
            None => {
                sink.write(&block)?;
                frames += block.len() as u64;
            }
            Some(transform) => {
                input.clear();
                input.extend(block.iter().map(|&s| i16_to_f32(s)));
                output.clear();
                transform.process(&input, &mut output)?;
                converted.clear();
                converted.extend(output.iter().map(|&s| f32_to_i16(s)));
                sink.write(&converted)?;
                frames += converted.len() as u64;
            }
        }
    }

    if let Some(transform) = transform {
        output.clear();
        transform.finish(&mut output)?;
        converted.clear();
        converted.extend(output.iter().map(|&s| f32_to_i16(s)));
        sink.write(&converted)?;
        frames += converted.len() as u64;
    }

    Ok(frames)
}

/// Экспортировать контейнер в итоговый файл `dest`
///
/// Контейнер удаляется в любом случае, при ошибке удаляется и
/// частично записанный итоговый файл.
pub fn export(
    container: FinishedContainer,
    settings: &JobSettings,
    config: &PipelineConfig,
    dest: &Path,
) -> Result<DeliveryArtifact> {
    let sample_rate = container.sample_rate();
    log::info!(
        "Exporting {:.1}s of audio to {} ({}, speed {})",
        container.duration_secs(),
        dest.display(),
        settings.format.label(),
        settings.speed
    );

    let result = open_sink(settings, config, sample_rate, dest).and_then(|mut sink| {
        let frames = transcode(&container, settings.speed, sink.as_mut())?;
        sink.finish()?;
        Ok(frames)
    });
    drop(container);

    let frames = match result {
        Ok(frames) => frames,
        Err(e) => {
            log::error!("Export to {} failed: {}", dest.display(), e);
            if dest.exists() {
                let _ = fs::remove_file(dest);
            }
            return Err(e);
        }
    };

    let size_bytes = fs::metadata(dest)?.len();
    let artifact = DeliveryArtifact {
        path: dest.to_path_buf(),
        format: settings.format,
        duration_secs: frames as f64 / sample_rate as f64,
        size_bytes,
        frames,
    };

    log::info!(
        "Exported {} ({:.1}s, {:.2} MB)",
        artifact.path.display(),
        artifact.duration_secs,
        artifact.size_mb()
    );
    Ok(artifact)
}
