// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::backend::DispatchError;
use crate::bittricks::floor_power_of_two;
use crate::imp::wgpu::buffer::GpuBuffer;
use crate::imp::wgpu::error::scoped;
use crate::imp::wgpu::pipeline::{PipelineCache, entry_point};
use crate::imp::wgpu::BoundDevice;
use crate::imp::wgpu::shader::Params;
use crate::scalar::{ScalarType, SortScalar};
use crate::schedule::PassDescriptor;
use crate::SortOrder;
use wgpu::util::DeviceExt;

/// Bytes of workgroup storage one lane needs: two 32-bit words.
const SHARED_BYTES_PER_LANE: u32 = 8;

/// Compute state for one bound device.
#[derive(Debug)]
pub struct Compute {
    bound_device: BoundDevice,
    pipelines: PipelineCache,
}

impl Compute {
    pub(crate) fn new(bound_device: BoundDevice) -> Self {
        Compute {
            bound_device,
            pipelines: PipelineCache::default(),
        }
    }

    pub fn adapter_name(&self) -> String {
        self.bound_device.adapter().get_info().name
    }

    /// Largest power-of-two workgroup whose lanes and shared array fit the device.
    pub fn max_parallel_group_size(&self, _scalar_type: ScalarType) -> Option<usize> {
        //every scalar is stored as a 32-bit word
        let limits = self.bound_device.device().limits();
        let lanes = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x)
            .min(limits.max_compute_workgroup_storage_size / SHARED_BYTES_PER_LANE);
        match floor_power_of_two(lanes as usize) {
            0 => None,
            unit => Some(unit),
        }
    }

    pub async fn upload<T: SortScalar>(
        &self,
        elements: &[T],
        debug_name: &str,
    ) -> Result<GpuBuffer<T>, DispatchError> {
        GpuBuffer::new(&self.bound_device, elements, debug_name).await
    }

    /// Records one pass into the buffer's pending encoder.
    pub async fn dispatch<T: SortScalar>(
        &self,
        buffer: &mut GpuBuffer<T>,
        pass: &PassDescriptor,
    ) -> Result<(), DispatchError> {
        let (Ok(grid_size), Ok(block_size), Ok(distance)) = (
            u32::try_from(pass.grid_size),
            u32::try_from(pass.block_size),
            u32::try_from(pass.distance),
        ) else {
            return Err(DispatchError::new(
                buffer.debug_name(),
                "pass does not fit 32-bit lanes",
            ));
        };
        if buffer.len() != pass.grid_size * 2 {
            return Err(DispatchError::new(
                buffer.debug_name(),
                format!(
                    "pass covers {} slots but the buffer holds {}",
                    pass.grid_size * 2,
                    buffer.len()
                ),
            ));
        }
        //general passes use no shared memory and run at full width
        let unit = if pass.is_fused() {
            pass.unit_size
        } else {
            self.max_parallel_group_size(T::SCALAR_TYPE)
                .unwrap_or(1)
                .min(pass.grid_size)
        };
        let kernels = self
            .pipelines
            .kernels(&self.bound_device, T::WORD, unit)
            .await?;
        let params = Params {
            grid_size,
            block_size,
            distance,
            descending: u32::from(pass.order == SortOrder::Descending),
        };
        let (groups_x, groups_y) = self.workgroups(pass.grid_size.div_ceil(unit));
        let label = entry_point(pass.kind);
        let device = self.bound_device.device();
        let bound_device = &self.bound_device;
        scoped(device, label, || {
            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("bitonic_sort params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let pipeline = kernels.for_kind(pass.kind);
            let layout = pipeline.get_bind_group_layout(0);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.storage().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: uniform.as_entire_binding(),
                    },
                ],
            });
            let encoder = buffer.encoder(bound_device);
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        })
        .await
    }

    /// `groups` workgroups, folded into two dimensions past the per-dimension limit.
    fn workgroups(&self, groups: usize) -> (u32, u32) {
        let max_x = self
            .bound_device
            .device()
            .limits()
            .max_compute_workgroups_per_dimension
            .max(1) as usize;
        let x = groups.min(max_x);
        let y = groups.div_ceil(x);
        (x as u32, y as u32)
    }

    pub async fn synchronize<T: SortScalar>(
        &self,
        buffer: &mut GpuBuffer<T>,
    ) -> Result<(), DispatchError> {
        buffer.submit_pending(&self.bound_device).await
    }

    pub async fn read_back<T: SortScalar>(
        &self,
        buffer: &GpuBuffer<T>,
        count: usize,
    ) -> Result<Vec<T>, DispatchError> {
        buffer.read(&self.bound_device, count).await
    }
}
