//! Обычные текстовые файлы (.txt, .md, .text)
//!
//! Кодировка подбирается по очереди: UTF-8, Windows-1251, CP866, Latin-1.
//! Latin-1 декодирует любые байты, поэтому последняя стратегия всегда
//! находит текст.

use std::path::Path;

use encoding_rs::{Encoding, IBM866, WINDOWS_1251};

use crate::error::Result;

use super::{Diagnostics, ExtractableSource, Strategy, StrategyOutcome};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Единственный байт, не определенный в Windows-1251; encoding_rs все равно
/// декодирует его как U+0098
const CP1251_UNDEFINED: u8 = 0x98;

/// Содержимое текстового файла
pub struct PlainTextSource {
    bytes: Vec<u8>,
}

impl PlainTextSource {
    /// Источник из уже прочитанных байтов
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    fn decode_with(&self, encoding: &'static Encoding, name: &str, diagnostics: &mut Diagnostics) -> StrategyOutcome {
        match encoding.decode_without_bom_handling_and_without_replacement(&self.bytes) {
            Some(text) => {
                diagnostics.ok(format!("Кодировка: {}", name));
                StrategyOutcome::Found(text.into_owned())
            }
            None => StrategyOutcome::TryNext,
        }
    }

    fn utf8(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        let bytes = self.bytes.strip_prefix(UTF8_BOM).unwrap_or(&self.bytes);
        Ok(match std::str::from_utf8(bytes) {
            Ok(text) => {
                diagnostics.ok("Кодировка: utf-8");
                StrategyOutcome::Found(text.to_string())
            }
            Err(_) => StrategyOutcome::TryNext,
        })
    }

    fn windows_1251(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        if self.bytes.contains(&CP1251_UNDEFINED) {
            return Ok(StrategyOutcome::TryNext);
        }
        Ok(self.decode_with(WINDOWS_1251, "cp1251", diagnostics))
    }

    fn cp866(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        Ok(self.decode_with(IBM866, "cp866", diagnostics))
    }

    fn latin1(&mut self, diagnostics: &mut Diagnostics) -> Result<StrategyOutcome> {
        diagnostics.ok("Кодировка: latin-1");
        Ok(StrategyOutcome::Found(self.bytes.iter().map(|&b| b as char).collect()))
    }
}

impl ExtractableSource for PlainTextSource {
    fn open(path: &Path, _diagnostics: &mut Diagnostics) -> Result<Option<Self>> {
        Ok(Some(Self::from_bytes(std::fs::read(path)?)))
    }

    fn strategies() -> Vec<(&'static str, Strategy<Self>)> {
        vec![
            ("utf-8", Self::utf8 as Strategy<Self>),
            ("cp1251", Self::windows_1251 as Strategy<Self>),
            ("cp866", Self::cp866 as Strategy<Self>),
            ("latin-1", Self::latin1 as Strategy<Self>),
        ]
    }

    fn exhausted_message() -> &'static str {
        "Не удалось определить кодировку"
    }
}
