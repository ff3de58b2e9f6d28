// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! WGSL for the compare-exchange kernels.
//!
//! One module is generated per (word type, unit size).  The unit size is a compile-time constant:
//! it sizes both the workgroup and its shared array.

use crate::scalar::GpuScalar;

pub(super) const FIRST_PASS: &str = "first_pass";
pub(super) const GENERAL_PASS: &str = "general_pass";
pub(super) const FINAL_PASS: &str = "final_pass";

/// Layout of the per-pass uniform.  Must match `Params` in the WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct Params {
    pub grid_size: u32,
    pub block_size: u32,
    pub distance: u32,
    pub descending: u32,
}

pub(super) fn source(word: GpuScalar, unit: usize) -> String {
    let ty = word.wgsl_name();
    let shared_len = unit * 2;
    format!(
        r#"
struct Params {{
    grid_size: u32,
    block_size: u32,
    distance: u32,
    descending: u32,
}}

@group(0) @binding(0) var<storage, read_write> data: array<{ty}>;
@group(0) @binding(1) var<uniform> params: Params;

const UNIT: u32 = {unit}u;
var<workgroup> shared_data: array<{ty}, {shared_len}>;

fn out_of_order(a: {ty}, b: {ty}) -> bool {{
    if (params.descending != 0u) {{
        return a < b;
    }}
    return a > b;
}}

fn partner_slots(lane: u32, block_size: u32, dist: u32) -> vec2<u32> {{
    let chunk = dist * 2u;
    let base = (lane / dist) * chunk;
    let offset = lane % dist;
    let low = base + offset;
    var high = low + dist;
    if (chunk == block_size) {{
        high = base + chunk - 1u - offset;
    }}
    return vec2<u32>(low, high);
}}

fn group_index(wid: vec3<u32>, groups: vec3<u32>) -> u32 {{
    return wid.x + wid.y * groups.x;
}}

fn local_stage(local: u32, block_size: u32, dist: u32) {{
    let slots = partner_slots(local, block_size, dist);
    let a = shared_data[slots.x];
    let b = shared_data[slots.y];
    if (out_of_order(a, b)) {{
        shared_data[slots.x] = b;
        shared_data[slots.y] = a;
    }}
    workgroupBarrier();
}}

fn load_group(start: u32, local: u32) {{
    shared_data[local] = data[start + local];
    shared_data[local + UNIT] = data[start + local + UNIT];
    workgroupBarrier();
}}

fn store_group(start: u32, local: u32) {{
    data[start + local] = shared_data[local];
    data[start + local + UNIT] = shared_data[local + UNIT];
}}

@compute @workgroup_size(UNIT)
fn {GENERAL_PASS}(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
    @builtin(local_invocation_index) local: u32,
) {{
    let lane = group_index(wid, groups) * UNIT + local;
    if (lane >= params.grid_size) {{
        return;
    }}
    let slots = partner_slots(lane, params.block_size, params.distance);
    let a = data[slots.x];
    let b = data[slots.y];
    if (out_of_order(a, b)) {{
        data[slots.x] = b;
        data[slots.y] = a;
    }}
}}

@compute @workgroup_size(UNIT)
fn {FIRST_PASS}(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
    @builtin(local_invocation_index) local: u32,
) {{
    let group = group_index(wid, groups);
    if (group >= params.grid_size / UNIT) {{
        return;
    }}
    let start = group * UNIT * 2u;
    load_group(start, local);
    for (var block = 2u; block <= UNIT * 2u; block = block * 2u) {{
        for (var dist = block / 2u; dist > 0u; dist = dist / 2u) {{
            local_stage(local, block, dist);
        }}
    }}
    store_group(start, local);
}}

@compute @workgroup_size(UNIT)
fn {FINAL_PASS}(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
    @builtin(local_invocation_index) local: u32,
) {{
    let group = group_index(wid, groups);
    if (group >= params.grid_size / UNIT) {{
        return;
    }}
    let start = group * UNIT * 2u;
    load_group(start, local);
    for (var dist = params.distance; dist > 0u; dist = dist / 2u) {{
        local_stage(local, params.block_size, dist);
    }}
    store_group(start, local);
}}
"#
    )
}
