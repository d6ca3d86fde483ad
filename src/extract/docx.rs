//! Документы Microsoft Word (.docx)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::Result;

use super::xml::docx_paragraphs;
use super::{Diagnostics, ExtractableSource, Strategy, StrategyOutcome};

const DOCUMENT_XML: &str = "word/document.xml";

/// Архив документа Word
pub struct DocxSource {
    archive: ZipArchive<File>,
}

impl DocxSource {
    fn paragraphs(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        let mut xml = String::new();
        self.archive.by_name(DOCUMENT_XML)?.read_to_string(&mut xml)?;

        let paragraphs = docx_paragraphs(&xml);
        if paragraphs.is_empty() {
            diagnostics.error("Документ пуст");
            return Ok(StrategyOutcome::TryNext);
        }

        diagnostics.ok(format!("Извлечено {} параграфов", paragraphs.len()));
        Ok(StrategyOutcome::Found(paragraphs.join("\n")))
    }
}

impl ExtractableSource for DocxSource {
    fn open(path: &Path, diagnostics: &mut Diagnostics) -> Result<Option<Self>> {
        let archive = ZipArchive::new(File::open(path)?)?;
        if !archive.file_names().any(|name| name == DOCUMENT_XML) {
            diagnostics.error("Неверная структура .docx файла");
            return Ok(None);
        }
        Ok(Some(Self { archive }))
    }

    fn strategies() -> Vec<(&'static str, Strategy<Self>)> {
        vec![("document.xml", Self::paragraphs as Strategy<Self>)]
    }

    fn exhausted_message() -> &'static str {
        "Не удалось извлечь текст из документа"
    }
}
