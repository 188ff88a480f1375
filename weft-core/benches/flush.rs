use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map};

use weft_core::reactive::{reactive, Value, WatchOptions, Watcher};
use weft_core::scheduler::run_pending_ticks;

fn state_with_keys(n: usize) -> Value {
    let mut map = Map::new();
    for i in 0..n {
        map.insert(format!("k{i}"), json!(i));
    }
    reactive(serde_json::Value::Object(map))
}

fn batched_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_flush");

    for watchers in [10usize, 100, 1000] {
        let state = state_with_keys(watchers);
        let handles: Vec<Watcher> = (0..watchers)
            .map(|i| {
                let s = state.clone();
                let key = format!("k{i}");
                Watcher::new(
                    move || Ok(s.as_object().and_then(|o| o.get(&key)).unwrap_or_default()),
                    |_, _| Ok(()),
                    WatchOptions::new(),
                )
                .expect("watcher evaluates")
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(watchers), &watchers, |b, &n| {
            let obj = state.as_object().cloned().expect("object state");
            let mut round = 0.0;
            b.iter(|| {
                round += 1.0;
                for i in 0..n {
                    obj.set(format!("k{i}"), round).expect("write");
                }
                black_box(run_pending_ticks())
            });
        });

        drop(handles);
    }

    group.finish();
}

fn computed_chain(c: &mut Criterion) {
    use weft_core::reactive::Computed;

    let state = reactive(json!({ "n": 0 }));
    let s = state.clone();
    let mut last = Computed::new(move || Ok(s.as_object().and_then(|o| o.get("n")).unwrap_or_default()));
    for _ in 0..50 {
        let prev = last.clone();
        last = Computed::new(move || {
            let v = prev.get()?.as_f64().unwrap_or_default();
            Ok(Value::from(v + 1.0))
        });
    }

    let obj = state.as_object().cloned().expect("object state");
    let mut n = 0.0;
    c.bench_function("computed_chain_50", |b| {
        b.iter(|| {
            n += 1.0;
            obj.set("n", n).expect("write");
            black_box(last.get().expect("evaluates"))
        });
    });
}

criterion_group!(benches, batched_flush, computed_chain);
criterion_main!(benches);
