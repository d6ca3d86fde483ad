//! Модуль извлечения текста из документов
//!
//! Этот модуль содержит извлечение текста из обычных текстовых файлов,
//! документов Word (.docx) и Apple Pages (.pages). Каждый формат описан как
//! [`ExtractableSource`] с упорядоченным списком стратегий: стратегии
//! пробуются по очереди, пока одна из них не найдет текст. Ход извлечения
//! записывается в диагностику, которая показывается пользователю как есть.

pub mod docx;
pub mod pages;
pub mod plain;
mod xml;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{AudiobookError, Result};

pub use docx::DocxSource;
pub use pages::PagesSource;
pub use plain::PlainTextSource;

/// Поддерживаемые расширения файлов
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["txt", "md", "text", "docx", "pages"];

/// Уровень записи диагностики
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Ok,
}

impl Severity {
    /// Тег уровня в начале строки
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Info => "[INFO]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
            Self::Ok => "[OK]",
        }
    }
}

/// Запись диагностики извлечения
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Уровень
    pub severity: Option<Severity>,
    /// Текст сообщения
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Some(severity) => write!(f, "{}{}", severity.tag(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Накопитель диагностики
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Some(Severity::Info), message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Some(Severity::Warn), message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Some(Severity::Error), message);
    }

    pub fn ok(&mut self, message: impl Into<String>) {
        self.push(Some(Severity::Ok), message);
    }

    /// Строка без тега уровня
    pub fn note(&mut self, message: impl Into<String>) {
        self.push(None, message);
    }

    fn push(&mut self, severity: Option<Severity>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Some(Severity::Error))
    }

    /// Строки диагностики с тегами
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

/// Результат извлечения текста
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Извлеченный текст, если он найден
    pub text: Option<String>,
    /// Ход извлечения
    pub diagnostics: Diagnostics,
}

impl Extraction {
    /// Диагностика одним текстом
    pub fn report(&self) -> String {
        self.diagnostics.lines().join("\n")
    }

    /// Текст или ошибка с диагностикой
    pub fn into_text(self, path: &Path) -> Result<String> {
        match self.text {
            Some(text) => Ok(text),
            None => Err(AudiobookError::Extraction {
                path: path.to_path_buf(),
                diagnostics: self.diagnostics.lines(),
            }),
        }
    }
}

/// Результат одной стратегии
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Текст найден
    Found(String),
    /// Перейти к следующей стратегии
    TryNext,
}

/// Стратегия извлечения для источника `S`
pub type Strategy<S> = fn(&mut S, &mut Diagnostics) -> Result<StrategyOutcome>;

/// Документ, из которого можно извлечь текст
pub trait ExtractableSource: Sized {
    /// Открыть документ; `None` означает, что извлечение невозможно
    /// и причина уже записана в диагностику
    fn open(path: &Path, diagnostics: &mut Diagnostics) -> Result<Option<Self>>;

    /// Стратегии в порядке применения
    fn strategies() -> Vec<(&'static str, Strategy<Self>)>;

    /// Сообщение, если ни одна стратегия не нашла текст
    fn exhausted_message() -> &'static str {
        "Не найдено подходящих файлов с текстом"
    }
}

/// Применить стратегии источника по порядку
pub fn run_strategies<S: ExtractableSource>(path: &Path) -> Extraction {
    let mut diagnostics = Diagnostics::new();

    let mut source = match S::open(path, &mut diagnostics) {
        Ok(Some(source)) => source,
        Ok(None) => {
            return Extraction {
                text: None,
                diagnostics,
            }
        }
        Err(e) => {
            log::warn!("Failed to open {}: {}", path.display(), e);
            diagnostics.error(format!("Критическая ошибка: {}", e));
            return Extraction {
                text: None,
                diagnostics,
            };
        }
    };

    for (name, strategy) in S::strategies() {
        match strategy(&mut source, &mut diagnostics) {
            Ok(StrategyOutcome::Found(text)) => {
                log::debug!("Extracted {} chars from {} via {}", text.chars().count(), path.display(), name);
                return Extraction {
                    text: Some(text),
                    diagnostics,
                };
            }
            Ok(StrategyOutcome::TryNext) => {}
            Err(e) => {
                log::debug!("Strategy {} failed for {}: {}", name, path.display(), e);
                diagnostics.warn(format!("{}: {}", name, crate::utils::naming::truncate_chars(&e.to_string(), 50)));
            }
        }
    }

    diagnostics.error(S::exhausted_message());
    Extraction {
        text: None,
        diagnostics,
    }
}

/// Нижний регистр расширения файла
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Поддерживается ли формат файла
pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension(path).as_str())
}

/// Извлечь текст из документа, выбрав формат по расширению
pub fn extract(path: &Path) -> Extraction {
    log::info!("Extracting text from {}", path.display());
    match extension(path).as_str() {
        "txt" | "md" | "text" => run_strategies::<PlainTextSource>(path),
        "docx" => run_strategies::<DocxSource>(path),
        "pages" => run_strategies::<PagesSource>(path),
        other => {
            let mut diagnostics = Diagnostics::new();
            diagnostics.error(format!("Неподдерживаемый формат: .{}", other));
            Extraction {
                text: None,
                diagnostics,
            }
        }
    }
}

/// Извлечь текст или вернуть ошибку с диагностикой
pub fn extract_text(path: &Path) -> Result<String> {
    extract(path).into_text(path)
}

/// Файлы поддерживаемых форматов: сами файлы и содержимое директорий
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        log::warn!("Skipping unreadable entry: {}", e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_supported(path))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_unsupported_format() {
        let extraction = extract(Path::new("book.pdf"));
        assert!(extraction.text.is_none());
        assert_eq!(extraction.report(), "[ERROR]Неподдерживаемый формат: .pdf");
    }

    #[test]
    fn test_missing_file_reports_error() {
        let extraction = extract(Path::new("/definitely/not/here/book.docx"));
        assert!(extraction.text.is_none());
        assert!(extraction.diagnostics.has_errors());
        assert!(extraction.report().starts_with("[ERROR]Критическая ошибка"));
    }

    #[test]
    fn test_collect_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("part2")).unwrap();
        fs::write(dir.path().join("b.txt"), "Б").unwrap();
        fs::write(dir.path().join("a.md"), "А").unwrap();
        fs::write(dir.path().join("cover.png"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("part2").join("c.TXT"), "В").unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt", "part2/c.TXT"]);
    }

    #[test]
    fn test_into_text_keeps_diagnostics() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("первое");
        diagnostics.note("   пояснение");
        let extraction = Extraction {
            text: None,
            diagnostics,
        };
        match extraction.into_text(Path::new("x.pages")) {
            Err(AudiobookError::Extraction { diagnostics, .. }) => {
                assert_eq!(diagnostics, vec!["[WARN]первое", "   пояснение"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
