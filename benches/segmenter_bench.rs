use audiobook_maker::config::DEFAULT_MAX_CHUNK_CHARS;
use audiobook_maker::media::audio::SpeedTransform;
use audiobook_maker::text::{preprocess_text, segment};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const PARAGRAPH: &str = "Однажды весною, в час небывало жаркого заката, в Москве, на \
Патриарших прудах, появились два гражданина. Первый из них, одетый в летнюю серенькую \
пару, был маленького роста, упитан, лыс; свою приличную шляпу пирожком нес в руке! \
А на хорошо выбритом лице его помещались сверхъестественных размеров очки в черной \
роговой оправе… Второй был плечистый, рыжеватый, вихрастый молодой человек?";

fn book(paragraphs: usize) -> String {
    let mut text = String::with_capacity(PARAGRAPH.len() * paragraphs * 2);
    for i in 0..paragraphs {
        text.push_str(&format!("# Глава {}\n\n", i + 1));
        text.push_str(PARAGRAPH);
        text.push_str("\n\n");
    }
    text
}

fn bench_segmenter(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    for paragraphs in [10usize, 100, 1_000] {
        let text = preprocess_text(&book(paragraphs));
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
            b.iter(|| segment(black_box(text), DEFAULT_MAX_CHUNK_CHARS))
        });
    }
    group.finish();

    let long_sentence = PARAGRAPH.replace(['.', '!', '?', '…'], ",").repeat(20);
    c.bench_function("segment_long_sentence", |b| {
        b.iter(|| segment(black_box(&long_sentence), DEFAULT_MAX_CHUNK_CHARS))
    });
}

fn bench_speed_transform(c: &mut Criterion) {
    let input: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
    let mut group = c.benchmark_group("speed_transform");
    group.sample_size(20);
    for speed in [0.75f32, 1.5] {
        group.bench_with_input(BenchmarkId::from_parameter(speed), &speed, |b, &speed| {
            b.iter(|| {
                let mut transform = SpeedTransform::new(speed).unwrap();
                let mut out = Vec::new();
                transform.process(black_box(&input), &mut out).unwrap();
                transform.finish(&mut out).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_segmenter, bench_speed_transform);
criterion_main!(benches);
