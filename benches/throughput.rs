//! Throughput benchmarks

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use modemchat_core::core::protocol::{classify_line, parse_answer, read_answer, Command, Pdu, RawAnswer};
use std::hint::black_box;
use std::time::Duration;

fn answer_bytes(records: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 1..=records {
        data.extend_from_slice(format!("\r\n+CPBR: {},\"+1555{:04}\",145,\"Contact {}\"\r\n", i, i, i).as_bytes());
    }
    data.extend_from_slice(b"\r\nOK\r\n");
    data
}

fn parse_benchmark(c: &mut Criterion) {
    let data = answer_bytes(50);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("read_answer", |b| {
        b.to_async(&rt).iter(|| async {
            let mut reader = black_box(&data[..]);
            let answer = read_answer(&mut reader, Duration::from_secs(1)).await.unwrap();
            black_box(answer)
        })
    });

    let lines: Vec<String> = (1..=50)
        .map(|i| format!("+CPBR: {},\"+1555{:04}\",145,\"Contact {}\"", i, i, i))
        .collect();
    group.bench_function("parse_answer", |b| {
        b.iter(|| {
            let value = parse_answer("+CPBR=", RawAnswer::new(black_box(lines.clone())));
            black_box(value)
        })
    });

    group.bench_function("classify_line", |b| {
        b.iter(|| {
            let kind = classify_line(black_box("+CMS ERROR: 14 SIM busy"));
            black_box(kind)
        })
    });

    group.finish();
}

fn encode_benchmark(c: &mut Criterion) {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(3);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("pdu_submit", |b| {
        b.iter(|| {
            let pdu = Pdu::submit(black_box("+15551234567"), black_box(&text)).unwrap();
            black_box(pdu.to_hex())
        })
    });

    group.bench_function("format_command", |b| {
        b.iter(|| {
            let wire = Command::new("+CMGS=").arg(black_box("0123456789")).arg(129).to_wire();
            black_box(wire)
        })
    });

    group.finish();
}

criterion_group!(benches, parse_benchmark, encode_benchmark);
criterion_main!(benches);
