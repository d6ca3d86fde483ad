use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use audiobook_maker::config::{JobSettings, OutputFormat, PipelineConfig, Voice};
use audiobook_maker::engine::{EngineError, EngineHandle, SpeechEngine, SynthesisRequest};
use audiobook_maker::error::AudiobookError;
use audiobook_maker::media::audio::expected_frames;
use audiobook_maker::notification::MemoryProgressObserver;
use audiobook_maker::pipeline::CancellationToken;
use audiobook_maker::AudiobookMaker;

const SAMPLE_RATE: u32 = 1_000;

/// Семплов на один символ текста
const SAMPLES_PER_CHAR: usize = 10;

/// Детерминированный движок: длина звука пропорциональна длине текста,
/// тексты со словом «Сбой» не озвучиваются
struct MockEngine {
    calls: Arc<AtomicUsize>,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            cancel_on_call: None,
        }
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
            }
        }

        if request.text.contains("Сбой") {
            return Err(EngineError::Rejected("cannot pronounce".to_string()));
        }

        let len = request.text.chars().count() * SAMPLES_PER_CHAR;
        Ok((0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect())
    }
}

/// Движок, который не озвучивает ничего
struct BrokenEngine;

impl SpeechEngine for BrokenEngine {
    fn name(&self) -> &str {
        "broken"
    }

    fn synthesize(&mut self, _request: &SynthesisRequest<'_>) -> Result<Vec<f32>, EngineError> {
        Err(EngineError::Rejected("model crashed".to_string()))
    }
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        sample_rate: SAMPLE_RATE,
        output_dir: dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn wav_settings() -> JobSettings {
    JobSettings {
        voice: Voice::Xenia,
        pause_secs: 0.5,
        format: OutputFormat::Wav,
        ..JobSettings::default()
    }
}

fn maker(dir: &Path, engine: impl SpeechEngine + 'static) -> AudiobookMaker {
    AudiobookMaker::new(config(dir), Arc::new(EngineHandle::ready(Box::new(engine))))
}

fn read_samples(path: &Path) -> Vec<i16> {
    hound::WavReader::open(path)
        .unwrap()
        .samples::<i16>()
        .map(|s| s.unwrap())
        .collect()
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_two_sentences_with_pauses() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), MockEngine::new());

    let outcome = maker.synthesize_text("Привет. Как дела?", &wav_settings()).unwrap();

    assert_eq!(outcome.stats.total_chunks, 2);
    assert_eq!(outcome.stats.failed, 0);
    // «Привет.» и «Как дела?» плюс пауза 0.5 сек после каждого
    let expected = 7 * SAMPLES_PER_CHAR + 500 + 9 * SAMPLES_PER_CHAR + 500;
    assert_eq!(outcome.artifact.frames, expected as u64);
    assert!((outcome.artifact.duration_secs - 1.16).abs() < 1e-9);
    assert_eq!(read_samples(&outcome.artifact.path).len(), expected);

    let name = outcome.artifact.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("audiobook_xenia_"));
    assert!(name.ends_with(".wav"));

    // Временный контейнер удален
    assert!(dir_entries(dir.path()).iter().all(|n| !n.starts_with("_temp_")));

    let log = outcome.log.render();
    assert!(log.starts_with("[INFO]Найдено фрагментов: 2"));
    assert!(log.contains("[OK]Готово за"));
    assert!(!log.contains("Пропущено"));
}

#[test]
fn test_threshold_abort_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), BrokenEngine);

    let failure = maker.synthesize_text("Раз. Два. Три.", &wav_settings()).unwrap_err();

    assert!(matches!(
        failure.error,
        AudiobookError::ThresholdExceeded { failed: 1, total: 3 }
    ));
    assert_eq!(failure.stats.processed, 1);
    assert!(failure.log.render().contains("[WARN]Ошибка в фрагменте 1/3: synthesis rejected: model crashed"));
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_partial_failure_skips_fragment_and_pause() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.failure_threshold = 0.5;
    let maker = AudiobookMaker::new(config, Arc::new(EngineHandle::ready(Box::new(MockEngine::new()))));

    let outcome = maker
        .synthesize_text("Один. Два. Сбой здесь. Четыре.", &wav_settings())
        .unwrap();

    assert_eq!(outcome.stats.total_chunks, 4);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.written, 3);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].position, 3);
    assert_eq!(outcome.failures[0].excerpt, "Сбой здесь.");

    let expected = (5 + 4 + 7) * SAMPLES_PER_CHAR + 3 * 500;
    assert_eq!(outcome.artifact.frames, expected as u64);
    assert!(outcome.log.render().contains("[WARN]Пропущено фрагментов: 1"));
}

#[test]
fn test_all_failed_without_threshold_reports_no_fragments() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.failure_threshold = 1.0;
    let maker = AudiobookMaker::new(config, Arc::new(EngineHandle::ready(Box::new(BrokenEngine))));

    let failure = maker.synthesize_text("Раз. Два.", &wav_settings()).unwrap_err();

    assert!(matches!(failure.error, AudiobookError::NoFragments));
    assert_eq!(failure.stats.failed, 2);
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_speed_changes_duration_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), MockEngine::new());
    let settings = JobSettings {
        speed: 1.5,
        ..wav_settings()
    };

    let outcome = maker.synthesize_text("Привет. Как дела?", &settings).unwrap();

    let raw_frames = (16 * SAMPLES_PER_CHAR + 1000) as u64;
    assert_eq!(outcome.artifact.frames, expected_frames(raw_frames, 1.5));
    assert_eq!(outcome.artifact.frames, 773);
    assert_eq!(read_samples(&outcome.artifact.path).len(), 773);
}

#[test]
fn test_same_input_gives_same_audio() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let text = "Однажды весною. В час небывало жаркого заката!";

    let first = maker(first_dir.path(), MockEngine::new())
        .synthesize_text(text, &wav_settings())
        .unwrap();
    let second = maker(second_dir.path(), MockEngine::new())
        .synthesize_text(text, &wav_settings())
        .unwrap();

    assert_eq!(first.artifact.frames, second.artifact.frames);
    assert_eq!(read_samples(&first.artifact.path), read_samples(&second.artifact.path));
}

#[test]
fn test_cancellation_between_fragments() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let engine = MockEngine {
        cancel_on_call: Some((2, token.clone())),
        ..MockEngine::new()
    };
    let calls = engine.calls.clone();
    let mut maker = maker(dir.path(), engine);
    maker.set_cancellation(token);

    let failure = maker.synthesize_text("Раз. Два. Три. Четыре.", &wav_settings()).unwrap_err();

    assert!(matches!(failure.error, AudiobookError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(failure.stats.processed, 2);
    assert!(failure.log.render().contains("[WARN]Синтез отменен"));
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_wav_carries_title_and_artist() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), MockEngine::new());
    let settings = JobSettings {
        title: Some("Мастер и Маргарита".to_string()),
        artist: Some("Булгаков".to_string()),
        ..wav_settings()
    };

    let outcome = maker.synthesize_text("Глава первая.", &settings).unwrap();

    let name = outcome.artifact.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Мастер_и_Маргарита_xenia_"));

    let bytes = fs::read(&outcome.artifact.path).unwrap();
    let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(contains(b"LIST"));
    assert!(contains(b"INAM"));
    assert!(contains(b"IART"));
    assert!(contains("Мастер и Маргарита".as_bytes()));
    assert!(contains("Булгаков".as_bytes()));

    // RIFF-размер совпадает с размером файла
    let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    assert_eq!(riff_size + 8, bytes.len());
    assert_eq!(read_samples(&outcome.artifact.path).len() as u64, outcome.artifact.frames);
}

#[test]
fn test_synthesize_file_uses_stem_as_title() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("книга.txt");
    fs::write(&input, "Глава первая.\n\nВсе началось утром.").unwrap();
    let out = dir.path().join("out");
    let maker = maker(&out, MockEngine::new());

    let outcome = maker.synthesize_file(&input, &wav_settings()).unwrap();

    let name = outcome.artifact.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("книга_xenia_"));
    assert_eq!(outcome.stats.total_chunks, 2);

    let log_path = outcome.log_path.unwrap();
    let saved = fs::read_to_string(log_path).unwrap();
    assert!(saved.contains("[INFO]Файл: книга_xenia_"));
}

#[test]
fn test_synthesize_file_reports_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    fs::write(&input, b"%PDF-1.4").unwrap();
    let maker = maker(dir.path(), MockEngine::new());

    let failure = maker.synthesize_file(&input, &wav_settings()).unwrap_err();

    assert!(failure.log.render().contains("[ERROR]"));
    assert_eq!(failure.stats.total_chunks, 0);
}

#[test]
fn test_batch_with_report_and_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(input.join("b")).unwrap();
    fs::write(input.join("a.txt"), "Первая книга. Конец.").unwrap();
    fs::write(input.join("b/book.md"), "# Вторая\n\nКнига.").unwrap();
    fs::write(input.join("c.txt"), "Сбой везде.").unwrap();
    fs::write(input.join("cover.jpg"), b"\xff\xd8").unwrap();

    let out = dir.path().join("out");
    let mut maker = maker(&out, MockEngine::new());
    let observer = MemoryProgressObserver::new();
    maker.add_observer(Box::new(observer.clone()));

    let outcome = maker.synthesize_batch(&[input], &wav_settings(), true).unwrap();

    assert_eq!(outcome.files.len(), 3);
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.files[0].name, "a.txt");
    assert_eq!(outcome.files[1].name, "book.md");
    assert!(outcome.files[1].status.is_done());
    assert!(!outcome.files[2].status.is_done());

    let report = fs::read_to_string(&outcome.report).unwrap();
    assert!(report.contains("Всего файлов: 3"));
    assert!(report.contains("  [OK]Успешно: 2\n  [ERROR]Ошибок: 1"));
    assert!(report.contains("3. c.txt\n   Статус: [ERROR]too many failed fragments (1/1)"));

    // Два аудиофайла, два журнала и отчет
    let bundle = outcome.bundle.unwrap();
    let archive = zip::ZipArchive::new(fs::File::open(bundle).unwrap()).unwrap();
    assert_eq!(archive.len(), 5);

    let history = observer.history();
    assert!(!history.is_empty());
    assert!(history.iter().any(|p| p.total_progress >= 100.0));
}

#[test]
fn test_batch_keeps_artifacts_with_same_stem() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(input.join("vol1")).unwrap();
    fs::create_dir_all(input.join("vol2")).unwrap();
    fs::write(input.join("vol1/chapter.txt"), "Первый том.").unwrap();
    fs::write(input.join("vol2/chapter.txt"), "Второй том, длиннее.").unwrap();

    let out = dir.path().join("out");
    let maker = maker(&out, MockEngine::new());
    let outcome = maker.synthesize_batch(&[input], &wav_settings(), true).unwrap();

    assert_eq!(outcome.succeeded(), 2);
    let audio: Vec<String> = dir_entries(&out)
        .into_iter()
        .filter(|name| name.starts_with("chapter_xenia_") && name.ends_with(".wav"))
        .collect();
    assert_eq!(audio.len(), 2);
    assert_ne!(
        read_samples(&out.join(&audio[0])).len(),
        read_samples(&out.join(&audio[1])).len()
    );

    // Два аудиофайла, два журнала и отчет
    let bundle = outcome.bundle.unwrap();
    let archive = zip::ZipArchive::new(fs::File::open(bundle).unwrap()).unwrap();
    assert_eq!(archive.len(), 5);
}

#[test]
fn test_preview_voice() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), MockEngine::new());

    let path = maker.preview_voice(Voice::Baya).unwrap();

    assert_eq!(path.file_name().unwrap(), "preview_baya.wav");
    let expected = format!("Привет! Я {}.", Voice::Baya.display_name()).chars().count() * SAMPLES_PER_CHAR;
    assert_eq!(read_samples(&path).len(), expected);
}

#[test]
fn test_preview_voice_with_broken_engine() {
    let dir = tempfile::tempdir().unwrap();
    let maker = maker(dir.path(), BrokenEngine);

    let error = maker.preview_voice(Voice::Aidar).unwrap_err();
    assert!(matches!(error, AudiobookError::Engine(EngineError::Rejected(_))));
    assert!(!dir.path().join("preview_aidar.wav").exists());
}
