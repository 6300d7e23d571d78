use mercount::{Error, HashCounter, MappedTable};

#[test]
fn new_and_drop() {
    let counter = HashCounter::<u32>::new();
    drop(counter);
}

#[test]
fn empty_iterates_empty() {
    let mut counter = HashCounter::<u32>::new();
    assert_eq!(counter.iter().count(), 0);
}

#[test]
fn five_distinct_keys_no_resize() {
    let mut counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(8)
        .max_reprobe(4)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        for key in 1..=5 {
            handle.inc(key);
        }
    }

    // Five keys cannot produce more than four conflicts on any probe
    // sequence, so the table must not have grown.
    assert_eq!(counter.size(), 8);

    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec![(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]);
}

#[test]
fn growth_preserves_every_key() {
    let mut counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(4)
        .max_reprobe(4)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        for key in 1..=9 {
            handle.inc(key);
        }
    }

    // Nine keys cannot fit four slots.
    assert!(counter.size() >= 16);

    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();
    assert_eq!(pairs, (1..=9).map(|k| (k, 1)).collect::<Vec<_>>());
}

#[test]
fn add_accumulates() {
    let mut counter = HashCounter::<u32>::builder().threads(1).build();

    {
        let mut handle = counter.handle();
        handle.add(10, 5);
        handle.add(10, 7);
        handle.inc(10);
    }

    assert_eq!(counter.iter().collect::<Vec<_>>(), vec![(10, 13)]);
}

#[test]
fn narrow_counter_saturates() {
    let mut counter = HashCounter::<u8>::builder()
        .key_bits(16)
        .capacity(8)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        handle.add(1, 200);
        handle.add(1, 100);
        // Saturated is terminal.
        handle.inc(1);
    }

    assert_eq!(counter.iter().collect::<Vec<_>>(), vec![(1, 255)]);
}

#[test]
fn saturates_without_wrapping() {
    let mut counter = HashCounter::<u8>::builder()
        .key_bits(16)
        .capacity(8)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        handle.add(3, 254);
        // One below the maximum plus two must clamp, not wrap.
        handle.add(3, 2);
    }

    assert_eq!(counter.iter().collect::<Vec<_>>(), vec![(3, 255)]);
}

#[test]
fn narrow_keys() {
    let mut counter = HashCounter::<u32>::builder()
        .key_bits(8)
        .capacity(256)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        // Payloads are 7 bits wide at this cell width.
        for key in 1..=100 {
            handle.inc(key);
        }
    }

    let mut pairs: Vec<_> = counter.iter().collect();
    pairs.sort_unstable();
    assert_eq!(pairs, (1..=100).map(|k| (k, 1)).collect::<Vec<_>>());
}

#[test]
fn print_lists_occupied_slots() {
    let mut counter = HashCounter::<u32>::builder().threads(1).build();

    {
        let mut handle = counter.handle();
        handle.add(11, 3);
        handle.add(500, 1);
    }

    let mut out = Vec::new();
    counter.print(&mut out).unwrap();

    let mut lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["11 3", "500 1"]);
}

#[test]
fn dump_round_trips() {
    let mut counter = HashCounter::<u32>::builder()
        .key_bits(40)
        .capacity(1024)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        for key in 1..=600u64 {
            handle.add(key, (key % 7 + 1) as u32);
        }
    }

    let mut bytes = Vec::new();
    counter.write(&mut bytes).unwrap();

    let mapped = MappedTable::<u32>::from_bytes(40, counter.size(), &bytes).unwrap();
    assert_eq!(mapped.size(), counter.size());

    let mut original: Vec<_> = counter.iter().collect();
    let mut restored: Vec<_> = mapped.iter().collect();
    original.sort_unstable();
    restored.sort_unstable();

    assert_eq!(restored.len(), 600);
    assert_eq!(original, restored);
}

#[test]
fn mapped_rejects_unrounded_size() {
    let bytes = vec![0u8; 128];
    assert!(matches!(
        MappedTable::<u32>::from_bytes(64, 100, &bytes),
        Err(Error::BadSize(100))
    ));
}

#[test]
fn iteration_restarts_fresh() {
    let mut counter = HashCounter::<u32>::builder().threads(1).build();

    {
        let mut handle = counter.handle();
        for key in 1..=20 {
            handle.inc(key);
        }
    }

    let first: Vec<_> = counter.iter().collect();
    let second: Vec<_> = counter.iter().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 20);
}

#[test]
fn stats_reporting_matches_build() {
    let counter = HashCounter::<u32>::new();
    assert_eq!(counter.has_stats(), cfg!(feature = "stats"));
    assert_eq!(counter.stats().is_some(), cfg!(feature = "stats"));

    let mut out = Vec::new();
    counter.print_stats(&mut out).unwrap();
    let text = std::str::from_utf8(&out).unwrap();
    assert!(text.contains("key_conflicts"));
    assert!(text.contains("resized_tables"));
}

#[cfg(feature = "stats")]
#[test]
fn stats_count_resizes() {
    let mut counter = HashCounter::<u32>::builder()
        .key_bits(64)
        .capacity(4)
        .max_reprobe(4)
        .threads(1)
        .build();

    {
        let mut handle = counter.handle();
        for key in 1..=40 {
            handle.inc(key);
        }
    }

    let doublings = (counter.size() / 4).trailing_zeros() as u64;
    assert!(doublings >= 1);
    assert_eq!(counter.stats().unwrap().resized_tables, doublings);
}
