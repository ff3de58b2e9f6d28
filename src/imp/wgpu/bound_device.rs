// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::Error;
use crate::imp::wgpu::unbound_device::UnboundDevice;
use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(not(target_arch = "wasm32"))]
use std::sync::mpsc::{self, Receiver, Sender};
#[cfg(not(target_arch = "wasm32"))]
use std::thread::{self, JoinHandle};
#[cfg(not(target_arch = "wasm32"))]
use wgpu::PollType;
use wgpu::Trace;

/// Internal resource management for BoundDevice
/// This type owns the actual GPU resources and handles cleanup
#[derive(Debug)]
struct BoundDeviceResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
    #[cfg(not(target_arch = "wasm32"))]
    poll_thread: Option<JoinHandle<()>>,
    #[cfg(not(target_arch = "wasm32"))]
    poll_shutdown: Arc<AtomicBool>,
    #[cfg(not(target_arch = "wasm32"))]
    poll_trigger: Sender<()>,
}

/// Cross-platform bound device that can be safely cloned
/// Multiple instances share the same underlying GPU resources
#[derive(Debug, Clone)]
pub struct BoundDevice {
    resources: Arc<BoundDeviceResources>,
}

impl BoundDevice {
    pub(crate) async fn bind(unbound_device: UnboundDevice) -> Result<Self, Error> {
        let adapter = unbound_device.adapter;
        //storage buffers and workgroup memory at the adapter's own limits
        let descriptor = wgpu::DeviceDescriptor {
            label: wgpu::Label::from("bitonic_sort device"),
            required_features: Default::default(),
            required_limits: adapter.limits(),
            memory_hints: Default::default(),
            trace: Trace::Off,
        };
        let (device, queue) = adapter.request_device(&descriptor).await?;
        #[cfg(not(target_arch = "wasm32"))]
        {
            let poll_device = device.clone();
            let poll_shutdown = Arc::new(AtomicBool::new(false));
            let shutdown_clone = poll_shutdown.clone();

            let (poll_sender, poll_receiver): (Sender<()>, Receiver<()>) = mpsc::channel();

            let poll_thread = thread::Builder::new()
                .name("wgpu_poll".to_string())
                .spawn(move || {
                    while !shutdown_clone.load(Ordering::Relaxed) {
                        // Wait for a signal that polling is needed
                        match poll_receiver.recv() {
                            Ok(_) => {
                                // Poll until the queue is empty
                                if let Err(e) = poll_device.poll(PollType::Wait) {
                                    logwise::warn_sync!(
                                        "wgpu poll failed: {err}",
                                        err = logwise::privacy::LogIt(&e)
                                    );
                                }
                            }
                            Err(_) => break, // Channel closed, exit thread
                        }
                    }
                })?;
            let resources = BoundDeviceResources {
                device,
                queue,
                adapter,
                poll_thread: Some(poll_thread),
                poll_shutdown,
                poll_trigger: poll_sender,
            };
            Ok(BoundDevice {
                resources: Arc::new(resources),
            })
        }
        #[cfg(target_arch = "wasm32")]
        {
            // On wasm32 the browser drives the device
            let resources = BoundDeviceResources {
                device,
                queue,
                adapter,
            };
            Ok(BoundDevice {
                resources: Arc::new(resources),
            })
        }
    }

    /// Signal the polling thread that GPU work may be ready
    pub fn set_needs_poll(&self) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = self.resources.poll_trigger.send(());
        }
        #[cfg(target_arch = "wasm32")]
        {
            let _ = self.resources.device.poll(wgpu::PollType::Poll);
        }
    }

    pub(super) fn device(&self) -> &wgpu::Device {
        &self.resources.device
    }

    pub(super) fn queue(&self) -> &wgpu::Queue {
        &self.resources.queue
    }

    pub(super) fn adapter(&self) -> &wgpu::Adapter {
        &self.resources.adapter
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Drop for BoundDeviceResources {
    fn drop(&mut self) {
        // Signal the polling thread to shut down
        self.poll_shutdown.store(true, Ordering::Relaxed);
        //wake it so it sees the flag
        let _ = self.poll_trigger.send(());

        // Wait for the polling thread to finish
        if let Some(handle) = self.poll_thread.take() {
            let _ = handle.join();
        }
    }
}
