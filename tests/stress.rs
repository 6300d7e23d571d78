use mercount::HashCounter;
use rand::prelude::*;

mod common;
use common::run_workers;

// Every thread hammers one key; the final table holds a single slot with
// the exact sum.
#[test]
fn same_key_hammered() {
    const THREADS: usize = 8;
    const PER_THREAD: u64 = 1_000_000;

    let counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(64)
        .threads(THREADS)
        .build();

    run_workers(&counter, THREADS, |_, handle| {
        for _ in 0..PER_THREAD {
            handle.inc(42);
        }
    });

    let mut counter = counter;
    let pairs: Vec<_> = counter.iter().collect();
    assert_eq!(pairs, vec![(42, (THREADS as u64 * PER_THREAD) as u32)]);
}

// Concurrent saturation: the counter clamps at all-ones no matter how the
// increments interleave.
#[test]
fn concurrent_saturation() {
    const THREADS: usize = 4;

    let counter = HashCounter::<u8>::builder()
        .key_bits(16)
        .capacity(16)
        .threads(THREADS)
        .build();

    run_workers(&counter, THREADS, |_, handle| {
        for _ in 0..100 {
            handle.inc(7);
        }
    });

    let mut counter = counter;
    assert_eq!(counter.iter().collect::<Vec<_>>(), vec![(7, u8::MAX)]);
}

// Distinct keys from every thread, forcing the table through repeated
// growth; nothing may be lost or double counted.
#[test]
fn resize_under_load() {
    const THREADS: usize = 4;
    const PER_THREAD: u64 = 4096;

    let counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(64)
        .max_reprobe(8)
        .threads(THREADS)
        .build();

    run_workers(&counter, THREADS, |t, handle| {
        for i in 1..=PER_THREAD {
            handle.inc(((t as u64) << 32) | i);
        }
    });

    let mut counter = counter;

    // 16384 keys cannot fit in fewer than 16384 slots, so the table grew
    // from 64 slots at least eight times.
    assert!(counter.size() >= THREADS as u64 * PER_THREAD);

    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();

    let mut expected = Vec::new();
    for t in 0..THREADS as u64 {
        for i in 1..=PER_THREAD {
            expected.push(((t << 32) | i, 1));
        }
    }
    expected.sort_unstable();

    assert_eq!(pairs, expected);
}

// Every thread inserts the same key set; counts merge across live inserts
// and copy-over without losing an increment.
#[test]
fn shared_keys_across_resizes() {
    const THREADS: usize = 4;
    const KEYS: u64 = 1000;

    let counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(32)
        .max_reprobe(8)
        .threads(THREADS)
        .build();

    run_workers(&counter, THREADS, |_, handle| {
        for key in 1..=KEYS {
            handle.inc(key);
        }
    });

    let mut counter = counter;
    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();

    assert_eq!(
        pairs,
        (1..=KEYS).map(|k| (k, THREADS as u32)).collect::<Vec<_>>()
    );
}

// Random interleavings of shared and private keys, checked against a
// sequential model.
#[test]
fn randomized_against_model() {
    const THREADS: usize = 4;
    const OPS: usize = 20_000;

    let mut rng = rand::thread_rng();
    let streams: Vec<Vec<u64>> = (0..THREADS)
        .map(|_| (0..OPS).map(|_| rng.gen_range(1..=512)).collect())
        .collect();

    let mut model = std::collections::HashMap::<u64, u64>::new();
    for stream in &streams {
        for &key in stream {
            *model.entry(key).or_default() += 1;
        }
    }

    let counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(64)
        .max_reprobe(8)
        .threads(THREADS)
        .build();

    let streams = &streams;
    run_workers(&counter, THREADS, |t, handle| {
        for &key in &streams[t] {
            handle.inc(key);
        }
    });

    let mut counter = counter;
    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();

    let mut expected: Vec<_> = model.iter().map(|(&k, &v)| (k, v as u32)).collect();
    expected.sort_unstable();

    assert_eq!(pairs, expected);
}
