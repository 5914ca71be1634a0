use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pii_ledger::{EngineConfig, RedactionEngine};

/// A call transcript of roughly `turns` speaker turns with PII sprinkled in.
fn transcript(turns: usize) -> String {
    (0..turns)
        .map(|i| match i % 4 {
            0 => format!("Agent: Thank you for calling, this is turn {i}. How can I help?\n"),
            1 => format!("Caller: My SSN is 123-45-{:04} and my phone is 555-{:04}.\n", i % 10_000, (i * 7) % 10_000),
            2 => format!("Agent: I see account {:011} on file, and email caller{i}@example.com.\n", i * 97),
            _ => "Caller: Señora Muñoz asked me to call back about the bill.\n".to_string(),
        })
        .collect()
}

fn bench_redact(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let engine = RedactionEngine::from_config(&EngineConfig::default()).expect("default config is valid");

    let mut group = c.benchmark_group("engine_redact");
    for turns in [10usize, 100, 1_000] {
        let text = transcript(turns);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_function(format!("{turns}_turns"), |b| {
            b.to_async(&rt).iter(|| async { black_box(engine.redact(black_box(&text)).await) })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_redact);
criterion_main!(benches);
