// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! bitonic_sort schedules a bitonic sorting network onto a compute backend.

A bitonic network sorts `n = 2^m` elements in `m(m+1)/2` compare-exchange stages.  On a GPU every
stage that crosses workgroups needs its own dispatch, but the stages whose comparisons stay inside a
workgroup can be fused into a single dispatch with workgroup-local barriers.  This crate computes
that fused schedule and drives it on a backend.

| Type                          | Role                                                             |
|-------------------------------|------------------------------------------------------------------|
| [`BitonicSort`]               | prepare/sort/read lifecycle over one padded buffer               |
| [`schedule::Schedule`]        | the pass sequence, as a pure iterator                            |
| [`ComputeBackend`]            | what a backend has to provide                                    |
| [`software::SoftwareBackend`] | CPU backend built on parallel tasks                              |
| [`ComputeContext`]            | wgpu backend (feature `backend_wgpu`, on by default)             |

# Padding

Inputs are padded to the next power of two with a sentinel that sorts after every real value:
the type's maximum for ascending sorts and its lowest value for descending ones.  The first `count`
slots of a sorted buffer are the sorted input; the rest are sentinels.

# Example

```
use bitonic_sort::software::SoftwareBackend;
use bitonic_sort::{BitonicSort, SortConfig, SortOrder};
use std::sync::Arc;

test_executors::sleep_on(async {
    let backend = Arc::new(SoftwareBackend::default());
    let config = SortConfig { order: SortOrder::Descending, ..SortConfig::default() };
    let mut sort = BitonicSort::<u16, _>::new(backend, config);
    sort.prepare(&[5, 3, 8, 1, 9]).await.unwrap();
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![9, 8, 5, 3, 1]);
});
```

# Features

* `backend_wgpu` (default): the GPU backend.
* `wgpu_webgl`: passes through to wgpu's WebGL support.  WebGL has no compute shaders, so this is
  only useful alongside WebGPU.
* `testing`: enables tests that need a real GPU adapter.
*/

mod bittricks;
pub mod backend;
#[cfg(feature = "backend_wgpu")]
pub mod context;
mod imp;
pub mod scalar;
pub mod schedule;
pub mod software;
mod sort;
mod sys;

pub use backend::{ComputeBackend, DispatchError};
#[cfg(feature = "backend_wgpu")]
pub use context::{ComputeContext, CreateError, GpuBuffer};
pub use scalar::{ScalarType, SortScalar, f16};
pub use schedule::{Fusion, PassDescriptor, PassKind};
pub use sort::{
    BitonicSort, InvalidDataReason, MAX_PADDED_COUNT, SortConfig, SortError, SortHandle,
    SortOrder, SortState, padded_buffer, sort_buffer,
};

pub type Priority = some_executor::Priority;
pub use vec_parallel::Strategy;
