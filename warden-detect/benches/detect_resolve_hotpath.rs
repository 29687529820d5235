use criterion::{black_box, criterion_group, criterion_main, Criterion};
use warden_core::{Catalog, PolicySet, SubjectDef, SubjectLabel};
use warden_detect::{resolve, RegexDetector};

const SAMPLE_TEXT: &str = "Contact John Smith at john.smith@example.com regarding the merger \
between Acme Corp and Johnson LLC. A follow-up email from jane.doe@example.com is expected \
once Acme Corp files the paperwork with Smith & Associates.";

fn sample_catalog() -> Catalog {
    Catalog {
        subjects: vec![
            SubjectDef {
                label: SubjectLabel::new("EMAIL"),
                patterns: vec![r"[\w.+-]+@[\w-]+\.[\w.-]+".to_string()],
                description: None,
                examples: vec![],
            },
            SubjectDef {
                label: SubjectLabel::new("COMPANY"),
                patterns: vec![r"\b[A-Z][a-zA-Z]+ (?:Corp|Inc|LLC|& Associates)\b".to_string()],
                description: None,
                examples: vec![],
            },
        ],
        predicates: vec![],
    }
}

fn bench_regex_detect(c: &mut Criterion) {
    let catalog = sample_catalog();
    let detector = RegexDetector::new(&catalog).expect("compile catalog patterns");

    c.bench_function("detect/regex_detect", |b| {
        b.iter(|| {
            let spans = detector.detect(black_box(SAMPLE_TEXT));
            black_box(spans.len());
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let catalog = sample_catalog();
    let detector = RegexDetector::new(&catalog).expect("compile catalog patterns");
    let policies = PolicySet { policies: Vec::new() };

    c.bench_function("detect/resolve", |b| {
        b.iter(|| {
            let spans = detector.detect(black_box(SAMPLE_TEXT));
            let resolved = resolve(spans, SAMPLE_TEXT, &policies, 0.5);
            black_box(resolved.len());
        });
    });
}

criterion_group!(benches, bench_regex_detect, bench_resolve);
criterion_main!(benches);
