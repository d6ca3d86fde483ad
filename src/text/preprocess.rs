//! Предобработка текста перед синтезом

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref MARKUP: Regex = Regex::new(r"[#*_~`]").unwrap();
}

/// Нормализует текст: схлопывает пробелы, убирает символы разметки
pub fn preprocess_text(text: &str) -> String {
    let text = WHITESPACE.replace_all(text, " ");
    let text = text.replace('\u{00a0}', " ");
    let text = MARKUP.replace_all(&text, "");
    text.trim().to_string()
}
