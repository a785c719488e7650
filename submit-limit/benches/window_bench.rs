use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use submit_limit::Cancel;
use submit_limit::FixedWindow;
use submit_limit::Permit;
use submit_limit::Strategy;

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_window");

    // Large enough that the window never fills during a run.
    let window = Arc::new(FixedWindow::new(
        NonZeroUsize::new(usize::MAX).unwrap(),
        Duration::from_secs(3600),
    ));
    let cancel = Cancel::new();

    group.bench_function("try_acquire", |b| {
        b.iter(|| {
            let _ = black_box(window.as_ref()).try_acquire();
        })
    });

    group.bench_function("acquire", |b| {
        b.iter(|| {
            let _ = black_box(window.as_ref()).acquire(&cancel, None);
        })
    });

    group.bench_function("permit", |b| {
        b.iter(|| {
            let permit = Permit::acquire(&window, &cancel, None);
            black_box(permit).ok();
        })
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_window_contended");

    for threads in [2, 4, 8] {
        group.bench_function(format!("{threads}-threads"), |b| {
            b.iter_custom(|iters| {
                let window = Arc::new(FixedWindow::new(
                    NonZeroUsize::new(usize::MAX).unwrap(),
                    Duration::from_secs(3600),
                ));
                let barrier = Arc::new(Barrier::new(threads + 1));

                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let window = Arc::clone(&window);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            let cancel = Cancel::new();
                            barrier.wait();
                            for _ in 0..iters {
                                let _ = black_box(window.acquire(&cancel, None));
                            }
                        })
                    })
                    .collect();

                barrier.wait();
                let start = Instant::now();
                for h in handles {
                    h.join().unwrap();
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
