use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use mercount::{CounterHandle, HashCounter, Value};

/// Drive `counter` with `threads` workers, each running `work` over its own
/// handle.
///
/// Handles are created up front, before any insert runs, so every worker is
/// guaranteed to observe and attend each resize. A worker that finishes its
/// work keeps syncing until all workers are done, so a resize triggered by
/// a straggler still gets its full barrier complement.
#[allow(dead_code)]
pub fn run_workers<V: Value>(
    counter: &HashCounter<V>,
    threads: usize,
    work: impl Fn(usize, &mut CounterHandle<'_, V>) + Sync,
) {
    let done = AtomicUsize::new(0);
    let handles: Vec<_> = (0..threads).map(|_| counter.handle()).collect();

    thread::scope(|s| {
        for (t, mut handle) in handles.into_iter().enumerate() {
            let done = &done;
            let work = &work;
            s.spawn(move || {
                work(t, &mut handle);

                done.fetch_add(1, Ordering::Release);
                while done.load(Ordering::Acquire) < threads {
                    handle.sync();
                    thread::yield_now();
                }
            });
        }
    });
}
