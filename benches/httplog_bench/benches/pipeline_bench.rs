//! Logging pipeline benchmarks
//!
//! Measures the cost httplog adds to one exchange: filtering, formatting and
//! the inactive-sink fast path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::{Method, StatusCode};
use httplog_core::filter::{body, header};
use httplog_core::testing::RecordingSink;
use httplog_core::{
    DisabledSink, HttpLogger, HttpRequest, HttpResponse, JsonHttpLogFormatter, Origin,
};

fn request() -> HttpRequest {
    HttpRequest::new(
        Origin::Remote,
        Method::POST,
        &"http://localhost:8080/api/users?access_token=abc&page=2".parse().unwrap(),
    )
    .with_remote("127.0.0.1")
    .with_headers(
        [
            ("Authorization", "Bearer secret"),
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
        ]
        .into_iter()
        .collect(),
    )
    .with_body(r#"{"name":"Alice","email":"alice@example.com","access_token":"t"}"#)
}

fn response() -> HttpResponse {
    HttpResponse::new(Origin::Local, StatusCode::OK)
        .with_headers([("Content-Type", "application/json")].into_iter().collect())
        .with_body(r#"{"id":1,"name":"Alice","refresh_token":"r"}"#)
}

/// Benchmark a full exchange with different formatters and sinks
fn bench_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("exchange");

    let inactive = HttpLogger::builder().sink(DisabledSink).build();
    group.bench_function("inactive_sink", |b| {
        b.iter(|| {
            inactive
                .process(black_box(request()))
                .write()
                .process(black_box(response()))
                .write()
        })
    });

    let sink = RecordingSink::new();
    let text = HttpLogger::builder().sink(sink.clone()).build();
    group.bench_function("text", |b| {
        b.iter(|| {
            text.process(black_box(request()))
                .write()
                .process(black_box(response()))
                .write();
            sink.clear();
        })
    });

    let json = HttpLogger::builder()
        .sink(sink.clone())
        .formatter(JsonHttpLogFormatter::new())
        .build();
    group.bench_function("json", |b| {
        b.iter(|| {
            json.process(black_box(request()))
                .write()
                .process(black_box(response()))
                .write();
            sink.clear();
        })
    });

    group.finish();
}

/// Benchmark individual filters
fn bench_filters(c: &mut Criterion) {
    use httplog_core::{BodyFilter, HeaderFilter, HttpMessage};

    let mut group = c.benchmark_group("filters");

    let headers = header::authorization();
    group.bench_function("authorization_header", |b| {
        b.iter(|| headers.filter(black_box(request().headers().clone())))
    });

    let bodies = body::default_value();
    let json = r#"{"user":{"name":"Alice","access_token":"t"},"items":[1,2,3]}"#;
    group.bench_function("json_body", |b| {
        b.iter(|| bodies.filter(Some("application/json"), black_box(json)))
    });

    group.finish();
}

criterion_group!(benches, bench_exchange, bench_filters);
criterion_main!(benches);
