//! Модуль для работы с текстом
//!
//! Этот модуль содержит предобработку текста, разбиение на фрагменты
//! для движка синтеза и анализ объема текста.

pub mod analysis;
pub mod preprocess;
pub mod segmenter;

pub use analysis::{analyze_text, TextAnalysis};
pub use preprocess::preprocess_text;
pub use segmenter::{segment, split_into_sentences, split_long_sentence, Chunk};
