//! Извлечение текста из XML без полного разбора документа

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENTITY: Regex = Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap();
    static ref PARAGRAPH: Regex = Regex::new(r"(?s)<w:p[ >].*?</w:p>").unwrap();
    static ref RUN_TEXT: Regex = Regex::new(r"(?s)<w:t(?:\s[^>]*[^/>])?>(.*?)</w:t>").unwrap();
    static ref TEXT_NODE: Regex = Regex::new(r">([^<]+)<").unwrap();
}

/// Заменить XML-сущности символами
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

/// Абзацы документа Word: тексты `<w:t>` внутри каждого `<w:p>`
pub fn docx_paragraphs(xml: &str) -> Vec<String> {
    PARAGRAPH
        .find_iter(xml)
        .map(|paragraph| {
            RUN_TEXT
                .captures_iter(paragraph.as_str())
                .map(|caps| decode_entities(&caps[1]))
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Непустые текстовые узлы документа
pub fn text_nodes(xml: &str) -> Vec<String> {
    TEXT_NODE
        .captures_iter(xml)
        .map(|caps| decode_entities(caps[1].trim()))
        .filter(|text| !text.is_empty())
        .collect()
}
