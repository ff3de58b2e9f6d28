// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compiled compare-exchange kernels, cached per (word type, unit size).

use crate::backend::DispatchError;
use crate::imp::wgpu::BoundDevice;
use crate::imp::wgpu::error::scoped;
use crate::imp::wgpu::shader;
use crate::scalar::GpuScalar;
use crate::schedule::PassKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub(super) struct Kernels {
    first: wgpu::ComputePipeline,
    general: wgpu::ComputePipeline,
    last: wgpu::ComputePipeline,
}

impl Kernels {
    pub(super) fn for_kind(&self, kind: PassKind) -> &wgpu::ComputePipeline {
        match kind {
            PassKind::First => &self.first,
            PassKind::General => &self.general,
            PassKind::Final => &self.last,
        }
    }
}

pub(super) fn entry_point(kind: PassKind) -> &'static str {
    match kind {
        PassKind::First => shader::FIRST_PASS,
        PassKind::General => shader::GENERAL_PASS,
        PassKind::Final => shader::FINAL_PASS,
    }
}

#[derive(Debug, Default)]
pub(super) struct PipelineCache {
    kernels: Mutex<HashMap<(GpuScalar, usize), Arc<Kernels>>>,
}

impl PipelineCache {
    pub(super) async fn kernels(
        &self,
        bound_device: &BoundDevice,
        word: GpuScalar,
        unit: usize,
    ) -> Result<Arc<Kernels>, DispatchError> {
        let key = (word, unit);
        if let Some(found) = self
            .kernels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(found.clone());
        }
        let label = format!("bitonic_sort {}x{unit}", word.wgsl_name());
        logwise::info_sync!("compiling kernels {label}", label = label.clone());
        let compile = logwise::perfwarn_begin!("wgpu::PipelineCache::kernels");
        let device = bound_device.device();
        let kernels = scoped(device, &label, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(shader::source(word, unit).into()),
            });
            let pipeline = |kind: PassKind| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(entry_point(kind)),
                    layout: None,
                    module: &module,
                    entry_point: Some(entry_point(kind)),
                    compilation_options: Default::default(),
                    cache: None,
                })
            };
            Kernels {
                first: pipeline(PassKind::First),
                general: pipeline(PassKind::General),
                last: pipeline(PassKind::Final),
            }
        })
        .await?;
        drop(compile);
        let kernels = Arc::new(kernels);
        //first insert wins
        let mut cache = self.kernels.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(kernels).clone())
    }
}
