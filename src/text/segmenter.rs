//! Разбиение текста на фрагменты для движка синтеза
//!
//! Движок принимает ограниченное количество символов за один вызов,
//! поэтому текст сначала делится на предложения, а слишком длинные
//! предложения дробятся по знакам препинания, затем по словам.
//!
//! Правила пунктуации рассчитаны на русский текст: многоточие завершает
//! предложение, тире разделяет части предложения. Граница распознается
//! только перед пробелом, поэтому сокращения вида «т. е.» тоже режутся.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Конец предложения: `.`, `!`, `?` или `…` перед пробелом
    static ref SENTENCE_BOUNDARY: Regex = Regex::new(r"[.!?…]\s+").unwrap();
    /// Граница части предложения: `,`, `;`, `:`, `–` или `—` перед пробелом
    static ref CLAUSE_BOUNDARY: Regex = Regex::new(r"[,;:–—]\s+").unwrap();
}

/// Фрагмент текста для одного вызова движка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Порядковый номер фрагмента, начиная с нуля
    pub index: usize,
    /// Текст фрагмента
    pub text: String,
    /// Фрагмент длиннее максимума: одно слово, которое нельзя разрезать
    pub oversized: bool,
}

impl Chunk {
    /// Длина фрагмента в символах
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Режет текст после знака препинания, оставляя знак в левой части
fn split_after_punctuation<'a>(pattern: &Regex, text: &'a str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for m in pattern.find_iter(text) {
        let punct_len = text[m.start()..].chars().next().map_or(0, char::len_utf8);
        pieces.push(&text[start..m.start() + punct_len]);
        start = m.end();
    }
    pieces.push(&text[start..]);
    pieces
}

/// Разбивает текст на предложения с учетом русской пунктуации
///
/// Предложения длиной не больше одного символа отбрасываются.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    split_after_punctuation(&SENTENCE_BOUNDARY, text)
        .into_iter()
        .map(str::trim)
        .filter(|s| char_len(s) > 1)
        .map(str::to_string)
        .collect()
}

/// Жадная упаковка частей в фрагменты до `max_chars` символов
struct Packer {
    max_chars: usize,
    current: String,
    chunks: Vec<String>,
}

impl Packer {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            current: String::new(),
            chunks: Vec::new(),
        }
    }

    fn fits(&self, piece: &str) -> bool {
        char_len(&self.current) + char_len(piece) + 1 <= self.max_chars
    }

    fn append(&mut self, piece: &str) {
        if self.current.is_empty() {
            self.current.push_str(piece);
        } else {
            self.current.push(' ');
            self.current.push_str(piece);
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
    }

    fn push_piece(&mut self, piece: &str) {
        if self.fits(piece) {
            self.append(piece);
            return;
        }

        self.flush();
        if char_len(piece) > self.max_chars {
            // Часть не помещается целиком: пакуем по словам
            for word in piece.split_whitespace() {
                if self.fits(word) {
                    self.append(word);
                } else {
                    self.flush();
                    self.current.push_str(word);
                }
            }
        } else {
            self.current.push_str(piece);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Делит длинное предложение на части не длиннее `max_chars` символов
///
/// Сначала по запятым, точкам с запятой, двоеточиям и тире, затем по словам.
/// Слово длиннее `max_chars` остается целым.
pub fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    if char_len(sentence) <= max_chars {
        return vec![sentence.to_string()];
    }

    let mut packer = Packer::new(max_chars);
    for piece in split_after_punctuation(&CLAUSE_BOUNDARY, sentence) {
        if !piece.is_empty() {
            packer.push_piece(piece);
        }
    }
    packer.finish()
}

/// Разбивает нормализованный текст на упорядоченные фрагменты
pub fn segment(text: &str, max_chars: usize) -> Vec<Chunk> {
    split_into_sentences(text)
        .iter()
        .flat_map(|sentence| split_long_sentence(sentence, max_chars))
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(index, text)| {
            let oversized = char_len(&text) > max_chars;
            if oversized {
                log::warn!(
                    "Chunk {} is {} chars long (max {}): a single word cannot be split",
                    index + 1,
                    char_len(&text),
                    max_chars
                );
            }
            Chunk { index, text, oversized }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_sentences() {
        let sentences = split_into_sentences("Привет. Как дела? Отлично! Ну… ладно.");
        assert_eq!(sentences, vec!["Привет.", "Как дела?", "Отлично!", "Ну…", "ладно."]);
    }

    #[test]
    fn test_boundary_requires_whitespace() {
        let sentences = split_into_sentences("Версия 1.5 вышла.Вчера");
        assert_eq!(sentences, vec!["Версия 1.5 вышла.Вчера"]);
    }

    #[test]
    fn test_abbreviations_are_split() {
        let sentences = split_into_sentences("Это т. е. пример.");
        assert_eq!(sentences, vec!["Это т.", "е.", "пример."]);
    }

    #[test]
    fn test_degenerate_sentences_dropped() {
        let sentences = split_into_sentences("Текст. . Дальше.");
        assert_eq!(sentences, vec!["Текст.", "Дальше."]);
        assert!(split_into_sentences("   ").is_empty());
    }

    #[test]
    fn test_short_sentence_unchanged() {
        assert_eq!(split_long_sentence("Коротко, ясно.", 900), vec!["Коротко, ясно."]);
    }

    #[test]
    fn test_split_on_clause_punctuation() {
        let sentence = "первая часть, вторая часть; третья часть — четвертая часть";
        let chunks = split_long_sentence(sentence, 30);
        assert_eq!(
            chunks,
            vec!["первая часть, вторая часть;", "третья часть — четвертая часть"]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn test_word_fallback_for_long_clause() {
        let words: Vec<String> = (0..240).map(|i| format!("сл{:03}", i)).collect();
        let sentence = words.join(" ");
        assert_eq!(sentence.chars().count(), 240 * 6 - 1);

        let chunks = split_long_sentence(&sentence, 900);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 900));
        assert_eq!(chunks.join(" "), sentence);
    }

    #[test]
    fn test_oversized_word_is_kept_whole() {
        let long_word = "а".repeat(20);
        let sentence = format!("кот {} пёс", long_word);
        let chunks = segment(&format!("{}.", sentence), 10);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["кот", long_word.as_str(), "пёс."]);
        assert!(chunks[1].oversized);
        assert!(!chunks[0].oversized);
    }

    #[test]
    fn test_segment_preserves_order_and_content() {
        let text = "Привет. Как дела?";
        let chunks = segment(text, 900);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
        let joined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined.join(" "), text);
    }

    #[test]
    fn test_segment_reconstructs_long_text() {
        let sentence = format!("{}, {}.", "слово ".repeat(120).trim(), "другое ".repeat(100).trim());
        let text = format!("Начало. {} Конец!", sentence);
        let chunks = segment(&text, 300);
        assert!(chunks.iter().all(|c| c.char_len() <= 300 && !c.text.is_empty()));
        let joined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined.join(" "), text);
    }
}
