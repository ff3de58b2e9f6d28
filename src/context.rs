// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The GPU compute backend.

A [`ComputeContext`] is an explicit, shareable handle to one GPU: the wgpu instance, the chosen
adapter, a bound device and queue, and the compiled kernels.  Create it once and share it by
[`Arc`](std::sync::Arc) between sorters.

```no_run
# //no_run: needs a GPU adapter
use bitonic_sort::{BitonicSort, ComputeContext, SortConfig};
use std::sync::Arc;

test_executors::sleep_on(async {
    let context = Arc::new(ComputeContext::new().await.unwrap());
    let mut sort = BitonicSort::<f32, _>::new(context, SortConfig::default());
    sort.prepare(&[3.0, -1.0, 2.5]).await.unwrap();
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![-1.0, 2.5, 3.0]);
});
```

# Backend selection

The wgpu backend is chosen from the environment, see
[`wgpu::InstanceDescriptor::from_env_or_default`].  For example `WGPU_BACKEND=vulkan`.

On native targets the context runs a device polling thread for as long as it lives.
*/

use crate::backend::{ComputeBackend, DispatchError};
use crate::imp;
use crate::scalar::{ScalarType, SortScalar};
use crate::schedule::PassDescriptor;
use std::fmt::Formatter;

#[derive(Debug)]
pub struct EntryPointError(imp::Error);
impl std::fmt::Display for EntryPointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for EntryPointError {}

#[derive(Debug)]
pub struct PickError(imp::Error);
impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for PickError {}

#[derive(Debug)]
pub struct BindError(imp::Error);
impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for BindError {}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum CreateError {
    #[error("Can't create entry point {0}")]
    EntryPoint(#[from] EntryPointError),
    #[error("Can't find a GPU {0}")]
    Gpu(#[from] PickError),
    #[error("Can't bind GPU {0}")]
    Bind(#[from] BindError),
}

/// A GPU that runs compare-exchange passes.
#[derive(Debug)]
pub struct ComputeContext {
    //declared first so the device drops before the instance
    compute: imp::Compute,
    #[allow(dead_code)] //keeps the instance alive
    entry_point: imp::EntryPoint,
}

impl ComputeContext {
    /// Picks an adapter and binds a device.
    pub async fn new() -> Result<Self, CreateError> {
        let entry_point = imp::EntryPoint::new().await.map_err(EntryPointError)?;
        let unbound_device = imp::UnboundDevice::pick(&entry_point)
            .await
            .map_err(PickError)?;
        let bound_device = imp::BoundDevice::bind(unbound_device)
            .await
            .map_err(BindError)?;
        let compute = imp::Compute::new(bound_device);
        logwise::info_sync!(
            "ComputeContext ready on {adapter}",
            adapter = compute.adapter_name()
        );
        Ok(ComputeContext {
            compute,
            entry_point,
        })
    }

    /// Name of the adapter the context is bound to.
    pub fn adapter_name(&self) -> String {
        self.compute.adapter_name()
    }
}

/// A padded buffer on a [`ComputeContext`].
#[derive(Debug)]
pub struct GpuBuffer<T>(imp::GpuBuffer<T>);

impl<T: SortScalar> GpuBuffer<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl ComputeBackend for ComputeContext {
    type Buffer<T: SortScalar> = GpuBuffer<T>;

    fn max_parallel_group_size(&self, scalar_type: ScalarType) -> Option<usize> {
        self.compute.max_parallel_group_size(scalar_type)
    }

    async fn upload<T: SortScalar>(
        &self,
        elements: &[T],
        debug_name: &str,
    ) -> Result<GpuBuffer<T>, DispatchError> {
        self.compute
            .upload(elements, debug_name)
            .await
            .map(GpuBuffer)
    }

    fn buffer_len<T: SortScalar>(&self, buffer: &GpuBuffer<T>) -> usize {
        buffer.len()
    }

    async fn dispatch_compare_exchange<T: SortScalar>(
        &self,
        buffer: &mut GpuBuffer<T>,
        pass: &PassDescriptor,
    ) -> Result<(), DispatchError> {
        self.compute.dispatch(&mut buffer.0, pass).await
    }

    async fn synchronize<T: SortScalar>(
        &self,
        buffer: &mut GpuBuffer<T>,
    ) -> Result<(), DispatchError> {
        self.compute.synchronize(&mut buffer.0).await
    }

    async fn read_back<T: SortScalar>(
        &self,
        buffer: &GpuBuffer<T>,
        count: usize,
    ) -> Result<Vec<T>, DispatchError> {
        self.compute.read_back(&buffer.0, count).await
    }
}
