//! Модуль для обработки аудио
//!
//! Этот модуль содержит изменение скорости речи ресемплингом и
//! преобразование семплов между 16-битным и плавающим форматами.
//!
//! Скорость меняется так: вход интерпретируется как записанный с частотой
//! `rate * speed` и ресемплируется обратно в `rate`. Высота тона при этом
//! меняется вместе со скоростью.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::Result;

/// Размер входного блока ресемплера
pub const BLOCK_SIZE: usize = 1024;

/// 16-битный семпл в диапазон [-1.0, 1.0)
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Семпл с плавающей точкой в 16-битный с округлением и насыщением
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Ожидаемое количество кадров после изменения скорости
pub fn expected_frames(input_frames: u64, speed: f32) -> u64 {
    (input_frames as f64 / speed as f64).round() as u64
}

/// Потоковое изменение скорости
///
/// Вход подается блоками произвольного размера через [`SpeedTransform::process`],
/// остаток выдается в [`SpeedTransform::finish`]. Задержка ресемплера
/// компенсируется, итоговая длина равна `round(input / speed)` кадров.
pub struct SpeedTransform {
    resampler: SincFixedIn<f32>,
    speed: f32,
    pending: Vec<f32>,
    skip: usize,
    input_frames: u64,
    emitted: u64,
}

impl SpeedTransform {
    /// Создать преобразование для множителя скорости `speed`
    pub fn new(speed: f32) -> Result<Self> {
        // Параметры sinc-интерполяции для высокого качества
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(1.0 / speed as f64, 1.0, params, BLOCK_SIZE, 1)?;
        let skip = resampler.output_delay();

        Ok(Self {
            resampler,
            speed,
            pending: Vec::with_capacity(BLOCK_SIZE),
            skip,
            input_frames: 0,
            emitted: 0,
        })
    }

    /// Обработать очередной блок, результат дописывается в `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) -> Result<()> {
        self.input_frames += input.len() as u64;
        self.pending.extend_from_slice(input);

        while self.pending.len() >= self.resampler.input_frames_next() {
            let needed = self.resampler.input_frames_next();
            let block = [&self.pending[..needed]];
            let produced = self.resampler.process(&block[..], None)?;
            self.pending.drain(..needed);
            self.emit(&produced[0], u64::MAX, out);
        }
        Ok(())
    }

    /// Завершить обработку и выдать оставшиеся кадры
    ///
    /// Возвращает общее количество выданных кадров.
    pub fn finish(mut self, out: &mut Vec<f32>) -> Result<u64> {
        let expected = expected_frames(self.input_frames, self.speed);

        if !self.pending.is_empty() {
            let tail = [std::mem::take(&mut self.pending)];
            let produced = self.resampler.process_partial(Some(&tail[..]), None)?;
            self.emit(&produced[0], expected, out);
        }

        while self.emitted < expected {
            let produced = self.resampler.process_partial::<Vec<f32>>(None, None)?;
            if produced[0].is_empty() {
                break;
            }
            self.emit(&produced[0], expected, out);
        }

        // Ресемплер не обязан выдать кадр в кадр
        while self.emitted < expected {
            out.push(0.0);
            self.emitted += 1;
        }

        Ok(self.emitted)
    }

    fn emit(&mut self, frames: &[f32], limit: u64, out: &mut Vec<f32>) {
        let skipped = self.skip.min(frames.len());
        self.skip -= skipped;

        for &frame in &frames[skipped..] {
            if self.emitted >= limit {
                break;
            }
            out.push(frame);
            self.emitted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (t * 220.0 * 2.0 * std::f32::consts::PI).sin() * 0.5
            })
            .collect()
    }

    fn run(input: &[f32], speed: f32, block: usize) -> Vec<f32> {
        let mut transform = SpeedTransform::new(speed).unwrap();
        let mut out = Vec::new();
        for piece in input.chunks(block) {
            transform.process(piece, &mut out).unwrap();
        }
        let total = transform.finish(&mut out).unwrap();
        assert_eq!(total as usize, out.len());
        out
    }

    #[test]
    fn test_sample_conversion() {
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_eq!(f32_to_i16(i16_to_f32(1234)), 1234);
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(-1.5), i16::MIN);
    }

    #[test]
    fn test_faster_speech_is_shorter() {
        let input = sine(24_000, 24_000);
        let out = run(&input, 2.0, 700);
        assert_eq!(out.len(), 12_000);
    }

    #[test]
    fn test_slower_speech_is_longer() {
        let input = sine(10_001, 16_000);
        let out = run(&input, 0.5, 4096);
        assert_eq!(out.len(), 20_002);
    }

    #[test]
    fn test_output_keeps_signal_level() {
        let input = sine(48_000, 48_000);
        let out = run(&input, 1.25, 1000);
        assert_eq!(out.len() as u64, expected_frames(48_000, 1.25));

        // Середина сигнала не должна затухать после компенсации задержки
        let middle = &out[out.len() / 4..out.len() * 3 / 4];
        let peak = middle.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak = {}", peak);
    }

    #[test]
    fn test_short_input() {
        let out = run(&[0.1, 0.2, 0.3], 1.5, 10);
        assert_eq!(out.len(), 2);
    }
}
