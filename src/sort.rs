// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The bitonic sort scheduler.

[`BitonicSort`] owns one padded buffer on a [`ComputeBackend`] and walks it through a simple
lifecycle:

```text
            prepare                sort
Unprepared ────────▶ Prepared ────────────▶ Sorted
     ▲                  ▲  │                  │
     │                  └──┴──── prepare ─────┘
     └──────── backend failure ───────────────┘
```

`prepare` copies the elements into a buffer padded to the next power of two.  The padding slots
hold a sentinel that sorts after every real value, so after the sort the first `count` slots hold
the sorted elements and the tail holds only sentinels.

`sort` issues the pass schedule (see [`crate::schedule`]) and then waits for the backend.  A
backend failure aborts the schedule, drops the buffer and returns the sorter to `Unprepared`.

# Examples

```
use bitonic_sort::software::SoftwareBackend;
use bitonic_sort::{BitonicSort, SortConfig, SortState};
use std::sync::Arc;

test_executors::sleep_on(async {
    let backend = Arc::new(SoftwareBackend::default());
    let mut sort = BitonicSort::<i32, _>::new(backend, SortConfig::default());
    let handle = sort.prepare(&[9, 1, 7]).await.unwrap();
    assert_eq!(handle.padded_count, 4);
    sort.sort().await.unwrap();
    assert_eq!(sort.state(), SortState::Sorted);
    assert_eq!(sort.read().await.unwrap(), vec![1, 7, 9]);
    assert_eq!(sort.read_padded().await.unwrap(), vec![1, 7, 9, i32::MAX]);
});
```
*/

use crate::backend::{ComputeBackend, DispatchError};
use crate::bittricks::{floor_power_of_two, padded_count};
use crate::scalar::SortScalar;
use crate::schedule::{Fusion, Schedule};
use crate::sys::time::Instant;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Largest padded buffer the scheduler accepts.
///
/// Kernels index slots with 32-bit lanes.
pub const MAX_PADDED_COUNT: usize = 1 << 31;

/// Direction of the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Whether `a`, sitting in the lower slot, must be exchanged with `b`.
    pub fn out_of_order<T: PartialOrd>(self, a: &T, b: &T) -> bool {
        match self {
            SortOrder::Ascending => a > b,
            SortOrder::Descending => a < b,
        }
    }

    /// The value padding slots are filled with.
    pub fn sentinel<T: SortScalar>(self) -> T {
        match self {
            SortOrder::Ascending => T::MAXIMUM,
            SortOrder::Descending => T::LOWEST,
        }
    }
}

/// Configures a [`BitonicSort`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortConfig<'a> {
    pub order: SortOrder,
    pub fusion: Fusion,
    /// Caps the group size the backend reports.  Rounded down to a power of two.
    pub max_group_size: Option<usize>,
    /// Label for backend buffers and dispatches.
    pub debug_name: &'a str,
}

impl Default for SortConfig<'_> {
    fn default() -> Self {
        SortConfig {
            order: SortOrder::Ascending,
            fusion: Fusion::Enabled,
            max_group_size: None,
            debug_name: "bitonic_sort",
        }
    }
}

/// Sizes of a prepared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortHandle {
    /// Number of real elements.
    pub count: usize,
    /// Buffer length; the smallest power of two `>= count`.
    pub padded_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortState {
    Unprepared,
    Prepared,
    Sorted,
}

/// Why data was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum InvalidDataReason {
    #[error("no elements")]
    Empty,
    #[error("{count} elements pad past the largest supported buffer")]
    TooLarge { count: usize },
    #[error("buffer of {len} slots is not padded to a power of two")]
    NotPadded { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SortError {
    #[error("Invalid data: {0}")]
    InvalidData(InvalidDataReason),
    #[error("No buffer is prepared")]
    BufferNotPrepared,
    #[error("Backend dispatch failed: {0}")]
    BackendDispatchFailure(#[from] DispatchError),
}

/// Sorts one buffer of `T` on backend `B`.
pub struct BitonicSort<T: SortScalar, B: ComputeBackend> {
    backend: Arc<B>,
    order: SortOrder,
    fusion: Fusion,
    max_group_size: Option<usize>,
    debug_name: String,
    prepared: Option<(B::Buffer<T>, SortHandle)>,
    state: SortState,
}

impl<T: SortScalar, B: ComputeBackend> BitonicSort<T, B> {
    pub fn new(backend: Arc<B>, config: SortConfig<'_>) -> Self {
        BitonicSort {
            backend,
            order: config.order,
            fusion: config.fusion,
            max_group_size: config.max_group_size,
            debug_name: config.debug_name.to_string(),
            prepared: None,
            state: SortState::Unprepared,
        }
    }

    fn config(&self) -> SortConfig<'_> {
        SortConfig {
            order: self.order,
            fusion: self.fusion,
            max_group_size: self.max_group_size,
            debug_name: &self.debug_name,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    /// The sizes of the prepared buffer, if any.
    pub fn handle(&self) -> Option<SortHandle> {
        self.prepared.as_ref().map(|(_, handle)| *handle)
    }

    /**
    Copies `elements` into a new padded buffer, replacing any previous one.

    # Errors

    * [`SortError::InvalidData`] if `elements` is empty or pads past [`MAX_PADDED_COUNT`].
      The previous buffer, if any, is kept.
    * [`SortError::BackendDispatchFailure`] if the upload fails.  The sorter is left unprepared.
    */
    pub async fn prepare(&mut self, elements: &[T]) -> Result<SortHandle, SortError> {
        let padded = checked_padded_count(elements.len())?;
        logwise::info_sync!(
            "prepare {name}: {count} elements padded to {padded}",
            name = self.debug_name.clone(),
            count = elements.len(),
            padded = padded
        );
        self.prepared = None;
        self.state = SortState::Unprepared;
        let (buffer, padded) =
            padded_buffer(&*self.backend, elements, self.order, &self.debug_name).await?;
        let handle = SortHandle {
            count: elements.len(),
            padded_count: padded,
        };
        self.prepared = Some((buffer, handle));
        self.state = SortState::Prepared;
        Ok(handle)
    }

    /// Runs the pass schedule over the prepared buffer and waits for the backend.
    ///
    /// Sorting a buffer that is already sorted leaves it unchanged.
    pub async fn sort(&mut self) -> Result<(), SortError> {
        let Some((mut buffer, handle)) = self.prepared.take() else {
            return Err(SortError::BufferNotPrepared);
        };
        //the buffer is back in place only once the schedule completes
        self.state = SortState::Unprepared;
        let config = self.config();
        let started = Instant::now();
        match sort_buffer::<T, B>(&*self.backend, &mut buffer, &config).await {
            Ok(passes) => {
                let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
                logwise::info_sync!(
                    "sorted {name}: {count} elements, {passes} passes in {micros}us",
                    name = config.debug_name,
                    count = handle.count,
                    passes = passes,
                    micros = micros
                );
                self.prepared = Some((buffer, handle));
                self.state = SortState::Sorted;
                Ok(())
            }
            Err(e) => {
                logwise::error_sync!(
                    "sort of {name} failed: {err}",
                    name = config.debug_name,
                    err = logwise::privacy::LogIt(&e)
                );
                Err(e)
            }
        }
    }

    /// The first `count` elements of the buffer.
    ///
    /// Before [`Self::sort`] this is the prepared data, in its original order.
    pub async fn read(&self) -> Result<Vec<T>, SortError> {
        let (buffer, handle) = self.prepared.as_ref().ok_or(SortError::BufferNotPrepared)?;
        self.read_prefix(buffer, handle.count).await
    }

    /// Every slot of the buffer, including the padding.
    pub async fn read_padded(&self) -> Result<Vec<T>, SortError> {
        let (buffer, handle) = self.prepared.as_ref().ok_or(SortError::BufferNotPrepared)?;
        self.read_prefix(buffer, handle.padded_count).await
    }

    async fn read_prefix(&self, buffer: &B::Buffer<T>, count: usize) -> Result<Vec<T>, SortError> {
        let read = logwise::perfwarn_begin!("BitonicSort::read");
        let values = self.backend.read_back::<T>(buffer, count).await?;
        drop(read);
        Ok(values)
    }

    /// The passes [`Self::sort`] would issue for the prepared buffer.
    pub fn schedule(&self) -> Result<Schedule, SortError> {
        let handle = self.handle().ok_or(SortError::BufferNotPrepared)?;
        Ok(plan::<T, B>(&*self.backend, handle.padded_count, &self.config()))
    }
}

impl<T: SortScalar, B: ComputeBackend> Debug for BitonicSort<T, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitonicSort")
            .field("backend", &self.backend)
            .field("scalar", &T::SCALAR_TYPE)
            .field("order", &self.order)
            .field("debug_name", &self.debug_name)
            .field("handle", &self.handle())
            .field("state", &self.state)
            .finish()
    }
}

fn checked_padded_count(count: usize) -> Result<usize, SortError> {
    if count == 0 {
        return Err(SortError::InvalidData(InvalidDataReason::Empty));
    }
    match padded_count(count) {
        Some(padded) if padded <= MAX_PADDED_COUNT => Ok(padded),
        _ => Err(SortError::InvalidData(InvalidDataReason::TooLarge { count })),
    }
}

/**
Builds a backend buffer holding `elements` followed by padding sentinels for `order`.

Returns the buffer and its padded length.
*/
pub async fn padded_buffer<T: SortScalar, B: ComputeBackend>(
    backend: &B,
    elements: &[T],
    order: SortOrder,
    debug_name: &str,
) -> Result<(B::Buffer<T>, usize), SortError> {
    let padded = checked_padded_count(elements.len())?;
    let upload = logwise::perfwarn_begin!("bitonic_sort::padded_buffer");
    let mut staged = Vec::with_capacity(padded);
    staged.extend_from_slice(elements);
    staged.resize(padded, order.sentinel::<T>());
    let buffer = backend.upload(&staged, debug_name).await?;
    drop(upload);
    Ok((buffer, padded))
}

/// The schedule for a buffer of `padded` slots on `backend`.
fn plan<T: SortScalar, B: ComputeBackend>(
    backend: &B,
    padded: usize,
    config: &SortConfig<'_>,
) -> Schedule {
    let reported = backend.max_parallel_group_size(T::SCALAR_TYPE);
    let capped = match (reported, config.max_group_size) {
        (Some(r), Some(cap)) => Some(r.min(cap)),
        (r, _) => r,
    };
    match (config.fusion, capped.map(floor_power_of_two)) {
        (Fusion::Enabled, Some(unit)) if unit > 0 => {
            Schedule::new(padded, unit, Fusion::Enabled, config.order)
        }
        (Fusion::Enabled, _) => {
            logwise::warn_sync!(
                "{name}: backend reports no group size for {scalar}; issuing unfused passes",
                name = config.debug_name,
                scalar = T::SCALAR_TYPE.name()
            );
            Schedule::new(padded, 1, Fusion::Disabled, config.order)
        }
        (Fusion::Disabled, _) => Schedule::new(padded, 1, Fusion::Disabled, config.order),
    }
}

/**
Sorts a caller-owned buffer that is already padded to a power of two.

Returns the number of passes dispatched.  The buffer contents are unspecified if this fails.
*/
pub async fn sort_buffer<T: SortScalar, B: ComputeBackend>(
    backend: &B,
    buffer: &mut B::Buffer<T>,
    config: &SortConfig<'_>,
) -> Result<usize, SortError> {
    let len = backend.buffer_len::<T>(buffer);
    if len == 0 || !len.is_power_of_two() {
        return Err(SortError::InvalidData(InvalidDataReason::NotPadded { len }));
    }
    if len > MAX_PADDED_COUNT {
        return Err(SortError::InvalidData(InvalidDataReason::TooLarge { count: len }));
    }
    let schedule = plan::<T, B>(backend, len, config);
    logwise::info_sync!(
        "sort {name}: {len} slots, unit {unit}",
        name = config.debug_name,
        len = len,
        unit = schedule.unit_size()
    );
    let sorting = logwise::perfwarn_begin!("bitonic_sort::sort_buffer");
    let mut passes = 0;
    for pass in schedule {
        logwise::trace_sync!(
            "dispatch {pass}",
            pass = logwise::privacy::LogIt(&pass)
        );
        backend.dispatch_compare_exchange::<T>(buffer, &pass).await?;
        passes += 1;
    }
    backend.synchronize::<T>(buffer).await?;
    drop(sorting);
    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarType;
    use crate::schedule::PassDescriptor;
    use crate::software::{SoftwareBackend, SoftwareBuffer, SoftwareConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the dispatch after `fail_after` successful ones.
    #[derive(Debug)]
    struct FailingBackend {
        inner: SoftwareBackend,
        fail_after: usize,
        dispatched: AtomicUsize,
    }

    impl ComputeBackend for FailingBackend {
        type Buffer<T: SortScalar> = SoftwareBuffer<T>;

        fn max_parallel_group_size(&self, scalar_type: ScalarType) -> Option<usize> {
            self.inner.max_parallel_group_size(scalar_type)
        }

        async fn upload<T: SortScalar>(
            &self,
            elements: &[T],
            debug_name: &str,
        ) -> Result<SoftwareBuffer<T>, DispatchError> {
            self.inner.upload(elements, debug_name).await
        }

        fn buffer_len<T: SortScalar>(&self, buffer: &SoftwareBuffer<T>) -> usize {
            self.inner.buffer_len(buffer)
        }

        async fn dispatch_compare_exchange<T: SortScalar>(
            &self,
            buffer: &mut SoftwareBuffer<T>,
            pass: &PassDescriptor,
        ) -> Result<(), DispatchError> {
            if self.dispatched.fetch_add(1, Ordering::Relaxed) >= self.fail_after {
                return Err(DispatchError::new("failing", "device lost"));
            }
            self.inner.dispatch_compare_exchange(buffer, pass).await
        }

        async fn synchronize<T: SortScalar>(
            &self,
            buffer: &mut SoftwareBuffer<T>,
        ) -> Result<(), DispatchError> {
            self.inner.synchronize(buffer).await
        }

        async fn read_back<T: SortScalar>(
            &self,
            buffer: &SoftwareBuffer<T>,
            count: usize,
        ) -> Result<Vec<T>, DispatchError> {
            self.inner.read_back(buffer, count).await
        }
    }

    fn software(max_group_size: Option<usize>) -> Arc<SoftwareBackend> {
        Arc::new(SoftwareBackend::new(SoftwareConfig {
            max_group_size,
            ..SoftwareConfig::default()
        }))
    }

    #[test]
    fn lifecycle() {
        test_executors::sleep_on(async {
            let mut sort = BitonicSort::<u32, _>::new(software(Some(64)), SortConfig::default());
            assert_eq!(sort.state(), SortState::Unprepared);
            assert_eq!(sort.sort().await, Err(SortError::BufferNotPrepared));
            assert_eq!(sort.read().await, Err(SortError::BufferNotPrepared));
            assert!(sort.schedule().is_err());

            let handle = sort.prepare(&[5, 3, 8, 1]).await.unwrap();
            assert_eq!(handle, SortHandle { count: 4, padded_count: 4 });
            assert_eq!(sort.state(), SortState::Prepared);
            assert_eq!(sort.read().await.unwrap(), vec![5, 3, 8, 1]);

            sort.sort().await.unwrap();
            assert_eq!(sort.state(), SortState::Sorted);
            assert_eq!(sort.read().await.unwrap(), vec![1, 3, 5, 8]);

            sort.prepare(&[2, 1]).await.unwrap();
            assert_eq!(sort.state(), SortState::Prepared);
            assert_eq!(sort.handle(), Some(SortHandle { count: 2, padded_count: 2 }));
        });
    }

    #[test]
    fn empty_is_invalid() {
        test_executors::sleep_on(async {
            let mut sort = BitonicSort::<f32, _>::new(software(Some(4)), SortConfig::default());
            assert_eq!(
                sort.prepare(&[]).await,
                Err(SortError::InvalidData(InvalidDataReason::Empty))
            );
            assert_eq!(sort.state(), SortState::Unprepared);
        });
    }

    #[test]
    fn too_large_is_invalid() {
        assert_eq!(
            checked_padded_count(MAX_PADDED_COUNT + 1),
            Err(SortError::InvalidData(InvalidDataReason::TooLarge {
                count: MAX_PADDED_COUNT + 1
            }))
        );
        assert_eq!(checked_padded_count(MAX_PADDED_COUNT), Ok(MAX_PADDED_COUNT));
        assert_eq!(checked_padded_count(5), Ok(8));
    }

    #[test]
    fn dispatch_failure_unprepares() {
        test_executors::sleep_on(async {
            let backend = Arc::new(FailingBackend {
                inner: SoftwareBackend::new(SoftwareConfig {
                    max_group_size: Some(1),
                    ..SoftwareConfig::default()
                }),
                fail_after: 2,
                dispatched: AtomicUsize::new(0),
            });
            let mut sort = BitonicSort::<i16, _>::new(backend.clone(), SortConfig::default());
            sort.prepare(&[4, 3, 2, 1, 0, -1, -2, -3]).await.unwrap();
            let error = sort.sort().await.unwrap_err();
            assert!(matches!(error, SortError::BackendDispatchFailure(_)));
            assert_eq!(sort.state(), SortState::Unprepared);
            assert_eq!(sort.handle(), None);
            assert_eq!(sort.sort().await, Err(SortError::BufferNotPrepared));
            //only the passes before the failure ran
            assert_eq!(backend.inner.dispatched_passes().len(), 2);
        });
    }

    #[test]
    fn group_size_is_capped_and_floored() {
        test_executors::sleep_on(async {
            let config = SortConfig {
                max_group_size: Some(3),
                ..SortConfig::default()
            };
            let mut sort = BitonicSort::<u16, _>::new(software(Some(256)), config);
            sort.prepare(&[0; 16]).await.unwrap();
            let schedule = sort.schedule().unwrap();
            assert_eq!(schedule.unit_size(), 2);
            assert_eq!(schedule.fusion(), Fusion::Enabled);
        });
    }

    #[test]
    fn missing_capability_falls_back_to_unfused() {
        test_executors::sleep_on(async {
            let backend = software(None);
            let mut sort = BitonicSort::<u32, _>::new(backend.clone(), SortConfig::default());
            sort.prepare(&[7, 6, 5, 4, 3, 2, 1, 0]).await.unwrap();
            assert_eq!(sort.schedule().unwrap().fusion(), Fusion::Disabled);
            sort.sort().await.unwrap();
            assert_eq!(sort.read().await.unwrap(), (0..8).collect::<Vec<_>>());
            let passes = backend.dispatched_passes();
            assert_eq!(passes.len(), 6);
            assert!(passes.iter().all(|p| !p.is_fused()));
        });
    }

    #[test]
    fn caller_owned_buffer() {
        test_executors::sleep_on(async {
            let backend = software(Some(2));
            let (mut buffer, padded) =
                padded_buffer(&*backend, &[3u32, 1, 2], SortOrder::Descending, "owned")
                    .await
                    .unwrap();
            assert_eq!(padded, 4);
            assert_eq!(buffer.as_slice(), &[3, 1, 2, u32::MIN]);
            let config = SortConfig {
                order: SortOrder::Descending,
                ..SortConfig::default()
            };
            let passes = sort_buffer::<u32, _>(&*backend, &mut buffer, &config)
                .await
                .unwrap();
            assert_eq!(passes, 1);
            assert_eq!(buffer.as_slice(), &[3, 2, 1, 0]);
        });
    }

    #[test]
    fn unpadded_buffer_is_rejected() {
        test_executors::sleep_on(async {
            let backend = software(Some(2));
            let mut buffer = backend.upload(&[3u32, 1, 2], "odd").await.unwrap();
            assert_eq!(
                sort_buffer::<u32, _>(&*backend, &mut buffer, &SortConfig::default()).await,
                Err(SortError::InvalidData(InvalidDataReason::NotPadded { len: 3 }))
            );
        });
    }

    #[test]
    fn order_helpers() {
        assert!(SortOrder::Ascending.out_of_order(&2, &1));
        assert!(!SortOrder::Ascending.out_of_order(&1, &1));
        assert!(SortOrder::Descending.out_of_order(&1, &2));
        assert_eq!(SortOrder::Descending.sentinel::<i16>(), i16::MIN);
        assert_eq!(SortOrder::Ascending.sentinel::<f32>(), f32::INFINITY);
    }
}
