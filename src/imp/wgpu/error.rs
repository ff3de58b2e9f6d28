// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("No such adapter: {0}")]
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    #[error("{0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    #[error("Adapter {0} does not support compute shaders")]
    NoCompute(String),
    #[error("Can't spawn the device polling thread: {0}")]
    PollThread(#[from] std::io::Error),
}

/// Runs `f` inside validation and out-of-memory error scopes.
///
/// Uncaptured wgpu errors panic.  Every call that can fail validation goes through here.
pub(crate) async fn scoped<R>(
    device: &wgpu::Device,
    label: &str,
    f: impl FnOnce() -> R,
) -> Result<R, crate::backend::DispatchError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let r = f();
    let validation = device.pop_error_scope().await;
    let out_of_memory = device.pop_error_scope().await;
    match validation.or(out_of_memory) {
        Some(e) => Err(crate::backend::DispatchError::new(label, e.to_string())),
        None => Ok(r),
    }
}
