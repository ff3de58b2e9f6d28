// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Sort scenarios on the software backend.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

use bitonic_sort::schedule::Schedule;
use bitonic_sort::software::{SoftwareBackend, SoftwareConfig};
use bitonic_sort::{
    BitonicSort, Fusion, InvalidDataReason, PassKind, SortConfig, SortError, SortOrder,
    SortScalar, SortState, Strategy, f16,
};
use std::sync::Arc;

/// Deterministic xorshift64 so failures reproduce.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

fn backend(max_group_size: Option<usize>) -> Arc<SoftwareBackend> {
    Arc::new(SoftwareBackend::new(SoftwareConfig {
        max_group_size,
        strategy: Strategy::Tasks(2),
        ..SoftwareConfig::default()
    }))
}

async fn sorted<T: SortScalar>(
    backend: Arc<SoftwareBackend>,
    config: SortConfig<'_>,
    values: &[T],
) -> Vec<T> {
    let mut sort = BitonicSort::<T, _>::new(backend, config);
    sort.prepare(values).await.unwrap();
    sort.sort().await.unwrap();
    sort.read().await.unwrap()
}

fn reference<T: SortScalar>(values: &[T], order: SortOrder) -> Vec<T> {
    let mut expected = values.to_vec();
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if order == SortOrder::Descending {
        expected.reverse();
    }
    expected
}

#[test_executors::async_test]
async fn four_elements() {
    let out = sorted(backend(Some(256)), SortConfig::default(), &[5u32, 3, 8, 1]).await;
    assert_eq!(out, vec![1, 3, 5, 8]);
}

#[test_executors::async_test]
async fn three_elements_pad_with_sentinel() {
    let mut sort = BitonicSort::<i32, _>::new(backend(Some(1)), SortConfig::default());
    let handle = sort.prepare(&[9, 1, 7]).await.unwrap();
    assert_eq!(handle.count, 3);
    assert_eq!(handle.padded_count, 4);
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![1, 7, 9]);
    assert_eq!(sort.read_padded().await.unwrap(), vec![1, 7, 9, i32::MAX]);
}

#[test_executors::async_test]
async fn empty_input_is_rejected() {
    let mut sort = BitonicSort::<u16, _>::new(backend(Some(4)), SortConfig::default());
    let result = sort.prepare(&[]).await;
    assert_eq!(result, Err(SortError::InvalidData(InvalidDataReason::Empty)));
    assert_eq!(sort.state(), SortState::Unprepared);
}

#[test_executors::async_test]
async fn sort_before_prepare() {
    let mut sort = BitonicSort::<f32, _>::new(backend(Some(4)), SortConfig::default());
    assert_eq!(sort.sort().await, Err(SortError::BufferNotPrepared));
}

#[test_executors::async_test]
async fn single_element_needs_no_passes() {
    let software = backend(Some(8));
    let mut sort = BitonicSort::<u32, _>::new(software.clone(), SortConfig::default());
    let handle = sort.prepare(&[42]).await.unwrap();
    assert_eq!(handle.padded_count, 1);
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![42]);
    assert!(software.dispatched_passes().is_empty());
}

#[test_executors::async_test]
async fn padded_counts() {
    let mut sort = BitonicSort::<u32, _>::new(backend(Some(8)), SortConfig::default());
    for (count, padded) in [(1, 1), (5, 8), (8, 8), (9, 16), (1000, 1024)] {
        let values: Vec<u32> = (0..count as u32).collect();
        let handle = sort.prepare(&values).await.unwrap();
        assert_eq!(handle.padded_count, padded, "count {count}");
    }
}

#[test_executors::async_test]
async fn pass_counts_for_eight() {
    for (unit, passes) in [(1, 6), (2, 3), (4, 1)] {
        let software = backend(Some(unit));
        let mut sort = BitonicSort::<u32, _>::new(software.clone(), SortConfig::default());
        sort.prepare(&[6, 2, 7, 1, 0, 4, 5, 3]).await.unwrap();
        assert_eq!(sort.schedule().unwrap().count(), passes);
        sort.sort().await.unwrap();
        assert_eq!(software.dispatched_passes().len(), passes, "unit {unit}");
        assert_eq!(sort.read().await.unwrap(), (0..8).collect::<Vec<u32>>());
    }

    let software = backend(Some(4));
    let config = SortConfig {
        fusion: Fusion::Disabled,
        ..SortConfig::default()
    };
    let mut sort = BitonicSort::<u32, _>::new(software.clone(), config);
    sort.prepare(&[6, 2, 7, 1, 0, 4, 5, 3]).await.unwrap();
    sort.sort().await.unwrap();
    let dispatched = software.dispatched_passes();
    assert_eq!(dispatched.len(), 6);
    assert!(dispatched.iter().all(|p| p.kind == PassKind::General));
}

#[test_executors::async_test]
async fn resorting_is_idempotent() {
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    let values: Vec<i16> = (0..300).map(|_| rng.next() as i16).collect();
    let mut sort = BitonicSort::<i16, _>::new(backend(Some(16)), SortConfig::default());
    sort.prepare(&values).await.unwrap();
    sort.sort().await.unwrap();
    let once = sort.read_padded().await.unwrap();
    sort.sort().await.unwrap();
    assert_eq!(sort.read_padded().await.unwrap(), once);
    assert_eq!(&once[..300], &reference(&values, SortOrder::Ascending)[..]);
    assert!(once[300..].iter().all(|v| *v == i16::MAX));
}

#[test_executors::async_test]
async fn reprepare_replaces_contents() {
    let mut sort = BitonicSort::<u32, _>::new(backend(Some(2)), SortConfig::default());
    sort.prepare(&[10, 20, 30, 40, 50, 60, 70]).await.unwrap();
    sort.sort().await.unwrap();
    let handle = sort.prepare(&[3, 2, 1]).await.unwrap();
    assert_eq!(handle.padded_count, 4);
    assert_eq!(sort.state(), SortState::Prepared);
    assert_eq!(sort.read_padded().await.unwrap(), vec![3, 2, 1, u32::MAX]);
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![1, 2, 3]);
}

#[test_executors::async_test]
async fn descending_pads_with_lowest() {
    let config = SortConfig {
        order: SortOrder::Descending,
        ..SortConfig::default()
    };
    let mut sort = BitonicSort::<f32, _>::new(backend(Some(2)), config);
    sort.prepare(&[0.5, -3.0, 7.25, 1.0, -0.0]).await.unwrap();
    sort.sort().await.unwrap();
    let padded = sort.read_padded().await.unwrap();
    assert_eq!(&padded[..5], &[7.25, 1.0, 0.5, -0.0, -3.0]);
    assert!(padded[5..].iter().all(|v| *v == f32::NEG_INFINITY));
}

#[test_executors::async_test]
async fn infinities_stay_in_the_prefix() {
    let values = [f32::INFINITY, 1.0, f32::NEG_INFINITY, 2.0, f32::INFINITY];
    let out = sorted(backend(Some(2)), SortConfig::default(), &values).await;
    assert_eq!(
        out,
        vec![f32::NEG_INFINITY, 1.0, 2.0, f32::INFINITY, f32::INFINITY]
    );

    let descending = SortConfig {
        order: SortOrder::Descending,
        ..SortConfig::default()
    };
    let out = sorted(backend(Some(2)), descending, &values).await;
    assert_eq!(
        out,
        vec![f32::INFINITY, f32::INFINITY, 2.0, 1.0, f32::NEG_INFINITY]
    );

    let halves = [f16::NEG_INFINITY, f16::from_f32(3.5), f16::INFINITY];
    let out = sorted(backend(Some(1)), descending, &halves).await;
    assert_eq!(out, vec![f16::INFINITY, f16::from_f32(3.5), f16::NEG_INFINITY]);
    let out = sorted(backend(Some(1)), SortConfig::default(), &halves).await;
    assert_eq!(out, vec![f16::NEG_INFINITY, f16::from_f32(3.5), f16::INFINITY]);
}

#[test_executors::async_test]
async fn many_small_sorts() {
    let software = backend(Some(2));
    let mut sort = BitonicSort::<i32, _>::new(software, SortConfig::default());
    for round in 0..200i32 {
        let values: Vec<i32> = (0..13).map(|i| (i * 5 + round) % 13 - 6).collect();
        sort.prepare(&values).await.unwrap();
        sort.sort().await.unwrap();
        assert_eq!(sort.read().await.unwrap(), (-6..7).collect::<Vec<i32>>(), "round {round}");
    }
}

async fn random_case<T: SortScalar>(seed: u64, make: impl Fn(u64) -> T) {
    let mut rng = XorShift(seed);
    for len in [3usize, 64, 1000] {
        let values: Vec<T> = (0..len).map(|_| make(rng.next())).collect();
        for unit in [None, Some(1), Some(4), Some(64)] {
            for order in [SortOrder::Ascending, SortOrder::Descending] {
                let config = SortConfig {
                    order,
                    debug_name: "random_case",
                    ..SortConfig::default()
                };
                let out = sorted(backend(unit), config, &values).await;
                assert_eq!(
                    out,
                    reference(&values, order),
                    "{:?} len {len} unit {unit:?} {order:?}",
                    T::SCALAR_TYPE
                );
            }
        }
    }
}

#[test_executors::async_test]
async fn random_every_scalar_type() {
    random_case::<u32>(1, |r| r as u32).await;
    random_case::<u16>(2, |r| r as u16).await;
    random_case::<i32>(3, |r| r as i32).await;
    random_case::<i16>(4, |r| r as i16).await;
    random_case::<f32>(5, |r| (r as i32) as f32 / 1024.0).await;
    random_case::<f16>(6, |r| f16::from_f32((r as i16) as f32 / 8.0)).await;
}

#[test_executors::async_test]
async fn duplicates_and_extremes() {
    let values = [u16::MAX, 0, u16::MAX, 7, 7, 0, 1];
    let out = sorted(backend(Some(2)), SortConfig::default(), &values).await;
    assert_eq!(out, vec![0, 0, 1, 7, 7, u16::MAX, u16::MAX]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn schedule_without_a_backend() {
    let passes: Vec<_> = Schedule::new(1 << 10, 1 << 4, Fusion::Enabled, SortOrder::Ascending)
        .collect();
    assert_eq!(passes.len(), 21);
    assert_eq!(passes[0].kind, PassKind::First);
    assert_eq!(passes.last().map(|p| p.kind), Some(PassKind::Final));
}
