// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Storage buffers for the wgpu backend.
//!
//! A [`GpuBuffer`] holds the padded elements as 32-bit words in a single `STORAGE` buffer.
//! Passes are recorded into a pending command encoder owned by the buffer, so a whole schedule
//! becomes one submission.  The encoder is submitted by [`GpuBuffer::submit_pending`].
//!
//! Reading back copies into a `MAP_READ` staging buffer, since wgpu only allows `MAP_READ` together
//! with `COPY_DST`.

use crate::backend::DispatchError;
use crate::imp::wgpu::BoundDevice;
use crate::imp::wgpu::error::scoped;
use crate::scalar::SortScalar;
use std::marker::PhantomData;
use wgpu::util::DeviceExt;
use wgpu::{BufferUsages, CommandEncoder, Label, MapMode};

/// Size of one stored element.
pub(super) const WORD_SIZE: u64 = 4;

#[derive(Debug)]
pub struct GpuBuffer<T> {
    storage: wgpu::Buffer,
    len: usize,
    pending: Option<CommandEncoder>,
    debug_name: String,
    element: PhantomData<T>,
}

impl<T: SortScalar> GpuBuffer<T> {
    pub(super) async fn new(
        bound_device: &BoundDevice,
        elements: &[T],
        debug_name: &str,
    ) -> Result<Self, DispatchError> {
        if elements.is_empty() {
            return Err(DispatchError::new(debug_name, "can't allocate an empty buffer"));
        }
        let limits = bound_device.device().limits();
        let byte_len = elements.len() as u64 * WORD_SIZE;
        let max = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if byte_len > max {
            return Err(DispatchError::new(
                debug_name,
                format!("{byte_len} bytes exceeds the device limit of {max}"),
            ));
        }
        let upload = logwise::perfwarn_begin!("wgpu::GpuBuffer::new");
        let words: Vec<u32> = elements.iter().map(|e| e.to_word()).collect();
        let storage = scoped(bound_device.device(), debug_name, || {
            bound_device
                .device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(debug_name),
                    contents: bytemuck::cast_slice(&words),
                    usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
                })
        })
        .await?;
        drop(upload);
        Ok(GpuBuffer {
            storage,
            len: elements.len(),
            pending: None,
            debug_name: debug_name.to_string(),
            element: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub(super) fn storage(&self) -> &wgpu::Buffer {
        &self.storage
    }

    pub(super) fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// The encoder passes are recorded into, created on first use.
    pub(super) fn encoder(&mut self, bound_device: &BoundDevice) -> &mut CommandEncoder {
        let debug_name = &self.debug_name;
        self.pending.get_or_insert_with(|| {
            bound_device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(debug_name.as_str()),
                })
        })
    }

    /// Submits recorded passes and waits for the queue to finish them.
    pub(super) async fn submit_pending(&mut self, bound_device: &BoundDevice) -> Result<(), DispatchError> {
        let Some(encoder) = self.pending.take() else {
            return Ok(());
        };
        let submit = logwise::perfwarn_begin!("wgpu::GpuBuffer::submit_pending");
        scoped(bound_device.device(), &self.debug_name, || {
            bound_device.queue().submit(std::iter::once(encoder.finish()));
        })
        .await?;
        let (s, r) = r#continue::continuation();
        bound_device.queue().on_submitted_work_done(|| {
            s.send(());
        });
        // Signal the polling thread that we need to poll
        bound_device.set_needs_poll();
        r.await;
        drop(submit);
        Ok(())
    }

    /// Reads the first `count` elements back to the host.
    pub(super) async fn read(&self, bound_device: &BoundDevice, count: usize) -> Result<Vec<T>, DispatchError> {
        if self.pending.is_some() {
            return Err(DispatchError::new(
                &self.debug_name,
                "read back with passes still unsubmitted",
            ));
        }
        if count > self.len {
            return Err(DispatchError::new(
                &self.debug_name,
                format!("read of {count} elements from a buffer of {}", self.len),
            ));
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let read = logwise::perfwarn_begin!("wgpu::GpuBuffer::read");
        let byte_len = count as u64 * WORD_SIZE;
        let staging = scoped(bound_device.device(), &self.debug_name, || {
            let staging = bound_device.device().create_buffer(&wgpu::BufferDescriptor {
                label: Label::from("bitonic_sort read back"),
                size: byte_len,
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder =
                bound_device
                    .device()
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Label::from("wgpu::GpuBuffer::read"),
                    });
            encoder.copy_buffer_to_buffer(&self.storage, 0, &staging, 0, byte_len);
            bound_device.queue().submit(std::iter::once(encoder.finish()));
            staging
        })
        .await?;

        let (s, r) = r#continue::continuation();
        staging.map_async(MapMode::Read, .., |result| {
            s.send(result.map_err(|e| e.to_string()));
        });
        bound_device.set_needs_poll();
        r.await
            .map_err(|reason| DispatchError::new(&self.debug_name, reason))?;

        let words: Vec<u32> = {
            let view = staging.get_mapped_range(..);
            bytemuck::pod_collect_to_vec(&view[..])
        };
        staging.unmap();
        drop(read);
        Ok(words.into_iter().map(T::from_word).collect())
    }
}
