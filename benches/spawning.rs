use criterion::{criterion_group, criterion_main, Criterion};
use localrpc::{query, serve, shutdown, spawn, Handler, Request, Response, ServeConfig};

struct Ping;

impl Handler for Ping {
    fn handle(&mut self, _request: &Request) -> Response {
        Response::success("pong")
    }
}

fn spawn_benchmark(c: &mut Criterion) {
    c.bench_function("spawn", |b| {
        b.iter(|| {
            // Spawn a worker, wait for its first answer, tear it down.
            let worker = spawn((), |_| {
                serve(&mut Ping, ServeConfig::default()).unwrap();
            });
            assert!(query(&worker, Request::new("ping", "")).is_success());
            shutdown(&worker);
        })
    });
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
