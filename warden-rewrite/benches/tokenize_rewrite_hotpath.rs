use criterion::{black_box, criterion_group, criterion_main, Criterion};
use secrecy::SecretString;
use warden_core::{SpanKind, TokenFormat};
use warden_rewrite::{rewrite, ReplacementSpan};
use warden_tokenize::Tokenizer;

const SAMPLE_TEXT: &str =
    "Contact John Smith at john.smith@example.com and jane.doe@example.com regarding the merger.";

fn bench_tokenize_and_rewrite(c: &mut Criterion) {
    let tokenizer = Tokenizer::new(&SecretString::from("bench-secret-key".to_string()), TokenFormat::Bracket);

    c.bench_function("tokenize_rewrite/session_and_splice", |b| {
        b.iter(|| {
            let mut session = tokenizer.session();
            let first_start = SAMPLE_TEXT.find("john.smith").unwrap();
            let second_start = SAMPLE_TEXT.find("jane.doe").unwrap();
            let spans = vec![
                ReplacementSpan {
                    start: first_start,
                    end: first_start + "john.smith@example.com".len(),
                    placeholder: session.placeholder(SpanKind::Subj, "EMAIL", "john.smith@example.com"),
                },
                ReplacementSpan {
                    start: second_start,
                    end: second_start + "jane.doe@example.com".len(),
                    placeholder: session.placeholder(SpanKind::Subj, "EMAIL", "jane.doe@example.com"),
                },
            ];
            let out = rewrite(black_box(SAMPLE_TEXT), &spans, &[]).expect("rewrite succeeds");
            black_box(out.len());
        });
    });
}

criterion_group!(benches, bench_tokenize_and_rewrite);
criterion_main!(benches);
