use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use readaloud::text::{clean_document, segment_paragraphs, segment_words};
use std::hint::black_box;

/// Markdown-ish document with front matter, properties and `paragraphs`
/// paragraphs of a few sentences each.
fn document(paragraphs: usize) -> String {
    let mut text = String::from("---\ntitle: Benchmark\ntags: [a, b]\n---\n");
    for i in 0..paragraphs {
        if i % 10 == 0 {
            text.push_str("status:: draft\n");
        }
        text.push_str(&format!(
            "Paragraph {i} opens with a short sentence. It continues with a\n\
             second line that wraps, carrying   irregular  spacing and a tab\there.\n\
             A third sentence closes it.\n\n"
        ));
    }
    text
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");

    for size in [10usize, 100, 1000] {
        let text = document(size);
        group.bench_with_input(BenchmarkId::new("clean", size), &text, |b, text| {
            b.iter(|| clean_document(black_box(text)))
        });
        group.bench_with_input(BenchmarkId::new("paragraphs", size), &text, |b, text| {
            let cleaned = clean_document(text);
            b.iter(|| segment_paragraphs(black_box(cleaned.text())))
        });
        group.bench_with_input(BenchmarkId::new("words", size), &text, |b, text| {
            let paragraphs = segment_paragraphs(clean_document(text).text());
            b.iter(|| {
                paragraphs
                    .iter()
                    .map(|p| segment_words(black_box(&p.text)).len())
                    .sum::<usize>()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
