//! Вспомогательные функции

pub mod logger;
pub mod naming;
