#![no_main]

use cardinality_scan::{IpSketch, Sketch};
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut estimator1 = IpSketch::new();
    for chunk in first_half.chunks(4) {
        estimator1.insert(chunk);
        assert!(estimator1.estimate() > 0);
        assert!(estimator1.size_of() > 0);
    }

    let mut estimator2 = IpSketch::new();
    for chunk in second_half.chunks(4) {
        estimator2.insert(chunk);
        assert!(estimator2.estimate() > 0);
        assert!(estimator2.size_of() > 0);
    }

    let mut merged = estimator1.clone();
    Sketch::merge(&mut merged, &estimator2).unwrap();
    let mut reversed = estimator2.clone();
    Sketch::merge(&mut reversed, &estimator1).unwrap();
    assert!(merged.estimate() >= estimator1.estimate().min(estimator2.estimate()));
    assert!(merged.estimate().abs_diff(reversed.estimate()) <= 1);
});
