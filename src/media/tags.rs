//! Метаданные итогового файла
//!
//! Для форматов с потерями теги передаются в FFmpeg аргументами
//! `-metadata`, для WAV дописывается RIFF-блок `LIST/INFO`.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::JobSettings;
use crate::error::{AudiobookError, Result};

/// Теги итогового файла
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    /// Название книги, пишется также как альбом
    pub title: Option<String>,
    /// Автор
    pub artist: Option<String>,
}

impl Tags {
    /// Теги из настроек задания
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            title: settings.title().map(str::to_string),
            artist: settings.artist().map(str::to_string),
        }
    }

    /// Нет ни одного тега
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none()
    }

    /// Аргументы `-metadata` для FFmpeg
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(title) = &self.title {
            args.push("-metadata".to_string());
            args.push(format!("title={}", title));
            args.push("-metadata".to_string());
            args.push(format!("album={}", title));
        }
        if let Some(artist) = &self.artist {
            args.push("-metadata".to_string());
            args.push(format!("artist={}", artist));
        }
        args
    }

    /// Блок `LIST/INFO` со всеми тегами
    pub fn info_chunk(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }

        let mut body = b"INFO".to_vec();
        if let Some(title) = &self.title {
            push_info_entry(&mut body, b"INAM", title);
            push_info_entry(&mut body, b"IPRD", title);
        }
        if let Some(artist) = &self.artist {
            push_info_entry(&mut body, b"IART", artist);
        }

        let mut chunk = b"LIST".to_vec();
        chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
        chunk.extend_from_slice(&body);
        Some(chunk)
    }
}

fn push_info_entry(body: &mut Vec<u8>, id: &[u8; 4], value: &str) {
    // Строка завершается нулем, блок выравнивается по четной границе
    let size = value.len() + 1;
    body.extend_from_slice(id);
    body.extend_from_slice(&(size as u32).to_le_bytes());
    body.extend_from_slice(value.as_bytes());
    body.push(0);
    if size % 2 == 1 {
        body.push(0);
    }
}

/// Дописать теги в готовый WAV-файл и обновить размер RIFF
pub fn append_info_chunk(path: &Path, tags: &Tags) -> Result<()> {
    let chunk = match tags.info_chunk() {
        Some(chunk) => chunk,
        None => return Ok(()),
    };

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let end = file.seek(SeekFrom::End(0))?;
    if end % 2 == 1 {
        return Err(AudiobookError::Export(format!(
            "unaligned WAV file {}",
            path.display()
        )));
    }
    file.write_all(&chunk)?;

    let riff_size = end + chunk.len() as u64 - 8;
    let riff_size = u32::try_from(riff_size)
        .map_err(|_| AudiobookError::Export("WAV file exceeds 4 GiB".to_string()))?;
    file.seek(SeekFrom::Start(4))?;
    file.write_all(&riff_size.to_le_bytes())?;
    file.flush()?;

    log::debug!("Wrote {} bytes of INFO tags to {}", chunk.len(), path.display());
    Ok(())
}
