//! Модуль для работы с медиафайлами
//!
//! Этот модуль содержит функции для обработки аудио и экспорта аудиокниги.

pub mod audio;
pub mod export;
pub mod ffmpeg;
pub mod tags;

pub use export::{export, DeliveryArtifact};
