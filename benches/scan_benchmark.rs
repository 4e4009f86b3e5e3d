use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pricelens::scan::document::Document;
use pricelens::scan::extractor::Extractor;
use pricelens::scan::scanner::Scanner;

const LINES: [&str; 6] = [
    "Free shipping on orders over $50",
    "Was €1,299.99, now only €999",
    "Plain paragraph with nothing priced in it at all",
    "Imported for 12,500 JPY (about 85 USD)",
    "Fee: 0.00042 BTC plus C$4.50 handling",
    "Contact us at 555-0100 between 9 and 5",
];

fn page_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| LINES[i % LINES.len()])
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_extract_line(c: &mut Criterion) {
    let extractor = Extractor::default();
    c.bench_function("extract_mixed_line", |b| {
        b.iter(|| extractor.extract(black_box("Was €1,299.99, now 999 EUR or $1,050")))
    });
}

fn bench_scan(c: &mut Criterion, paragraphs: usize) {
    let doc = Document::from_text(&page_text(paragraphs));
    let scanner = Scanner::default();

    c.bench_function(&format!("scan_{}_paragraphs", paragraphs), |b| {
        b.iter_batched(
            || doc.clone(),
            |mut doc| {
                let root = doc.root();
                scanner.scan(&mut doc, root)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_scan_100(c: &mut Criterion) {
    bench_scan(c, 100);
}

fn bench_scan_10_000(c: &mut Criterion) {
    bench_scan(c, 10_000);
}

fn bench_rescan_tagged(c: &mut Criterion) {
    let mut doc = Document::from_text(&page_text(1_000));
    let scanner = Scanner::default();
    let root = doc.root();
    scanner.scan(&mut doc, root);

    c.bench_function("rescan_1000_tagged_paragraphs", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut doc| scanner.scan(&mut doc, root),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_extract_line,
    bench_scan_100,
    bench_scan_10_000,
    bench_rescan_tagged
);
criterion_main!(benches);
