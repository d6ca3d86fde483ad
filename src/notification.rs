//! Модуль наблюдателей прогресса
//!
//! Готовые реализации [`ProgressObserver`]: строка прогресса в консоли,
//! журнал в файле, история в памяти, канал и функция обратного вызова.
//! Ошибки вывода наблюдатели проглатывают сами.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{ProgressInfo, ProgressObserver};

/// Ширина полосы прогресса в символах
const BAR_WIDTH: usize = 40;

fn details_suffix(progress: &ProgressInfo) -> String {
    progress
        .details
        .as_deref()
        .filter(|details| !details.is_empty())
        .map(|details| format!(" - {}", details))
        .unwrap_or_default()
}

/// Строка прогресса в stderr, перерисовываемая на месте
pub struct ConsoleProgressObserver {
    prefix: String,
    last_line: Mutex<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Строка с префиксом, например именем файла в пакетном режиме
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_line: Mutex::new(String::new()),
        }
    }

    fn render(&self, progress: &ProgressInfo) -> String {
        let filled = ((progress.total_progress / 100.0 * BAR_WIDTH as f32) as usize).min(BAR_WIDTH);
        format!(
            "{}[{}{}] {:5.1}% {}{}",
            self.prefix,
            "=".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            progress.total_progress,
            progress.step,
            details_suffix(progress)
        )
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let line = self.render(&progress);
        let mut last_line = self.last_line.lock();
        if *last_line == line {
            return;
        }

        let mut stderr = std::io::stderr().lock();
        // Хвост предыдущей, более длинной строки затирается пробелами
        let padding = last_line.chars().count().saturating_sub(line.chars().count());
        let _ = write!(stderr, "\r{}{}", line, " ".repeat(padding));
        if progress.total_progress >= 100.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
        *last_line = line;
    }
}

/// История уведомлений в памяти; клоны делят одну историю
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Последнее уведомление
    pub fn last(&self) -> Option<ProgressInfo> {
        self.history.lock().last().cloned()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Журнал прогресса в текстовом файле, по строке на уведомление
pub struct FileProgressObserver {
    path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let line = format!(
            "[{}] {}: {:.1}% (всего {:.1}%){}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            progress.step,
            progress.step_progress,
            progress.total_progress,
            details_suffix(&progress)
        );

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            log::debug!("Failed to append progress to {}: {}", self.path.display(), e);
        }
    }
}

/// Передача уведомлений в другой поток через канал
pub struct ChannelProgressObserver {
    sender: Mutex<mpsc::Sender<ProgressInfo>>,
}

impl ChannelProgressObserver {
    /// Наблюдатель и принимающая сторона канала
    pub fn new() -> (Self, mpsc::Receiver<ProgressInfo>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender: Mutex::new(sender) }, receiver)
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        // Получатель мог быть закрыт
        let _ = self.sender.lock().send(progress);
    }
}

/// Наблюдатель поверх замыкания
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}
