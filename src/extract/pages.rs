//! Документы Apple Pages (.pages)
//!
//! Современный формат Pages 5.0+ хранит текст в двоичных `.iwa` файлах,
//! которые не читаются: пользователю предлагается экспортировать документ.
//! Старые архивы читаются по очереди из превью QuickLook, XML-файлов и
//! вложенных текстовых файлов.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::Result;

use super::xml::text_nodes;
use super::{Diagnostics, ExtractableSource, Strategy, StrategyOutcome};

/// Пути к превью QuickLook в порядке проверки
const PREVIEW_PATHS: [&str; 3] = ["QuickLook/Preview.txt", "preview.txt", "Preview.txt"];

/// Минимальное количество слов длиннее двух символов в XML-файле
const MIN_XML_WORDS: usize = 10;

/// Архив документа Pages
pub struct PagesSource {
    archive: ZipArchive<File>,
    names: Vec<String>,
}

impl PagesSource {
    fn read_member(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.archive.by_name(name)?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn read_text_member(&mut self, name: &str) -> Result<String> {
        let bytes = self.read_member(name)?;
        Ok(String::from_utf8_lossy(&bytes).replace('\u{FFFD}', ""))
    }

    fn quicklook_preview(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        for preview in PREVIEW_PATHS {
            if !self.names.iter().any(|name| name == preview) {
                continue;
            }
            diagnostics.ok(format!("Найден {}", preview));
            let text = self.read_text_member(preview)?;
            if !text.trim().is_empty() {
                diagnostics.ok(format!("Извлечено {} символов", text.chars().count()));
                return Ok(StrategyOutcome::Found(text));
            }
        }
        Ok(StrategyOutcome::TryNext)
    }

    fn xml_text(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        let xml_files: Vec<String> = self.names.iter().filter(|n| n.ends_with(".xml")).cloned().collect();
        if xml_files.is_empty() {
            return Ok(StrategyOutcome::TryNext);
        }
        diagnostics.info(format!("Найдено XML файлов: {}", xml_files.len()));

        for xml_file in &xml_files {
            let xml = match self.read_text_member(xml_file) {
                Ok(xml) => xml,
                Err(e) => {
                    diagnostics.warn(format!(
                        "{}: {}",
                        xml_file,
                        crate::utils::naming::truncate_chars(&e.to_string(), 50)
                    ));
                    continue;
                }
            };

            let joined = text_nodes(&xml).join(" ");
            let words: Vec<&str> = joined.split_whitespace().filter(|w| w.chars().count() > 2).collect();
            if words.len() > MIN_XML_WORDS {
                diagnostics.ok(format!("Извлечено из {}: {} слов", xml_file, words.len()));
                return Ok(StrategyOutcome::Found(words.join(" ")));
            }
        }
        Ok(StrategyOutcome::TryNext)
    }

    fn text_members(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        let text_files: Vec<String> = self
            .names
            .iter()
            .filter(|n| n.ends_with(".txt") || n.ends_with(".text"))
            .cloned()
            .collect();

        for name in &text_files {
            match self.read_text_member(name) {
                Ok(text) if !text.trim().is_empty() => {
                    diagnostics.ok(format!("Извлечено из {}", name));
                    return Ok(StrategyOutcome::Found(text));
                }
                Ok(_) => {}
                Err(e) => log::debug!("Skipping {}: {}", name, e),
            }
        }
        Ok(StrategyOutcome::TryNext)
    }
}

impl ExtractableSource for PagesSource {
    fn open(path: &Path, diagnostics: &mut Diagnostics) -> Result<Option<Self>> {
        let archive = ZipArchive::new(File::open(path)?)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        diagnostics.info(format!("Архив содержит {} файлов", names.len()));
        let first: Vec<&str> = names.iter().take(5).map(String::as_str).collect();
        diagnostics.note(format!("Первые файлы: {}", first.join(", ")));

        if names.iter().any(|name| name.contains(".iwa")) {
            diagnostics.warn("Обнаружен современный формат .iwa (Pages 5.0+)");
            diagnostics.info("Рекомендация: экспортируйте файл как .txt или .docx");
            diagnostics.note("   Файл → Экспортировать → Word/Обычный текст");
            return Ok(None);
        }

        Ok(Some(Self { archive, names }))
    }

    fn strategies() -> Vec<(&'static str, Strategy<Self>)> {
        vec![
            ("quicklook", Self::quicklook_preview as Strategy<Self>),
            ("xml", Self::xml_text as Strategy<Self>),
            ("text members", Self::text_members as Strategy<Self>),
        ]
    }
}
