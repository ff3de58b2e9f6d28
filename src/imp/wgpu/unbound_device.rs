// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::DownlevelFlags;

pub struct UnboundDevice {
    pub(super) adapter: wgpu::Adapter,
}

impl UnboundDevice {
    /// Picks a compute-capable adapter.  No surface is involved.
    pub async fn pick(entry_point: &super::EntryPoint) -> Result<UnboundDevice, super::Error> {
        let options = wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        };
        let adapter = entry_point.0.request_adapter(&options).await?;
        let info = adapter.get_info();
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(super::Error::NoCompute(info.name));
        }
        logwise::info_sync!(
            "picked adapter {name} ({backend})",
            name = info.name.clone(),
            backend = logwise::privacy::LogIt(&info.backend)
        );
        Ok(UnboundDevice { adapter })
    }
}

impl std::fmt::Debug for UnboundDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnboundDevice")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}
