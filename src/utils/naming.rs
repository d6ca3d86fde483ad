//! Имена файлов и усечение строк для журналов

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Имя по умолчанию, если название не задано
pub const DEFAULT_STEM: &str = "audiobook";

/// Максимальная длина безопасного названия в символах
const MAX_STEM_CHARS: usize = 50;

/// Превращает название книги в безопасную часть имени файла
pub fn safe_stem(title: Option<&str>) -> String {
    let title = title.unwrap_or(DEFAULT_STEM);
    let cleaned = UNSAFE_CHARS.replace_all(title, "");
    let cleaned: String = cleaned.trim().chars().take(MAX_STEM_CHARS).collect();
    let stem = WHITESPACE.replace_all(cleaned.trim(), "_").into_owned();
    if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem
    }
}

/// Свободный путь `<dir>/<base><extension>`
///
/// Если файл или его журнал `.log.txt` уже есть, к имени добавляется
/// номер: `_2`, `_3` и так далее.
pub fn unique_path(dir: &Path, base: &str, extension: &str) -> PathBuf {
    let taken = |path: &Path| path.exists() || path.with_extension("log.txt").exists();

    let mut path = dir.join(format!("{}{}", base, extension));
    let mut n = 2;
    while taken(&path) {
        path = dir.join(format!("{}_{}{}", base, n, extension));
        n += 1;
    }
    path
}

/// Обрезает строку до `max_chars` символов
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Метка времени для имен отчетов и архивов
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
