// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
mod bound_device;
mod buffer;
mod compute;
mod entry_point;
mod error;
mod pipeline;
mod shader;
mod unbound_device;

pub use bound_device::BoundDevice;
pub use buffer::GpuBuffer;
pub use compute::Compute;
pub use entry_point::EntryPoint;
pub(crate) use error::Error;
pub use unbound_device::UnboundDevice;
