use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Фильтр по умолчанию, если RUST_LOG не задан
const DEFAULT_FILTER: &str = "warn,audiobook_maker=info";

/// Инициализировать `env_logger`; `verbose` включает отладочные сообщения крейта
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    if verbose {
        builder.filter_module("audiobook_maker", LevelFilter::Debug);
    }

    builder
        // Форматирование логов
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
