//! Модуль для работы с FFmpeg
//!
//! Этот модуль содержит поиск исполняемого файла FFmpeg и проверку его версии.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AudiobookError, Result};

/// Найти FFmpeg: явный путь из конфигурации или поиск в PATH
pub fn locate_ffmpeg(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => which::which(path).map_err(|e| {
            log::error!("FFmpeg not found at {}: {}", path.display(), e);
            AudiobookError::FfmpegNotFound
        }),
        None => which::which("ffmpeg").map_err(|e| {
            log::error!("FFmpeg not found in PATH: {}", e);
            AudiobookError::FfmpegNotFound
        }),
    }
}

/// Получение версии FFmpeg
pub fn ffmpeg_version(ffmpeg: &Path) -> Result<String> {
    let output = Command::new(ffmpeg).arg("-version").output()?;

    if !output.status.success() {
        return Err(AudiobookError::Export(format!(
            "ffmpeg -version failed with status: {}",
            output.status
        )));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    let first_line = version_str.lines().next().unwrap_or("");

    Ok(first_line.to_string())
}
