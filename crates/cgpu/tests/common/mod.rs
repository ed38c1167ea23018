//! Shared helpers for the cgpu integration tests.

#![allow(dead_code)]

use cgpu::{AppVersion, Cgpu, DeviceHandle};

/// Storage buffer copy: `dst[i] = src[i] * 2`.
pub const DOUBLE_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&dst)) {
        dst[id.x] = src[id.x] * 2u;
    }
}
"#;

/// Fills a storage image with opaque red.
pub const FILL_IMAGE_WGSL: &str = r#"
@group(0) @binding(0) var output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(output, vec2<i32>(id.xy), vec4<f32>(1.0, 0.0, 0.0, 1.0));
}
"#;

/// Storage buffers plus a storage image, for reflection checks.
pub const MIXED_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f32>;
@group(0) @binding(1) var<storage, read_write> output: array<f32>;
@group(0) @binding(2) var target_image: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    output[id.x] = input[id.x] + 1.0;
    textureStore(target_image, vec2<i32>(i32(id.x), 0), vec4<f32>(input[id.x]));
}
"#;

/// Compile a WGSL compute shader to SPIR-V words using naga.
pub fn compile_wgsl_to_words(wgsl_source: &str) -> Vec<u32> {
    let module = naga::front::wgsl::parse_str(wgsl_source).expect("failed to parse WGSL");

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .expect("WGSL validation failed");

    let options = naga::back::spv::Options {
        lang_version: (1, 0),
        ..Default::default()
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: naga::ShaderStage::Compute,
        entry_point: "main".to_string(),
    };

    let mut writer =
        naga::back::spv::Writer::new(&options).expect("failed to create SPIR-V writer");
    let mut words = Vec::new();
    writer
        .write(&module, &info, Some(&pipeline_options), &None, &mut words)
        .expect("failed to generate SPIR-V");
    words
}

pub fn compile_wgsl(wgsl_source: &str) -> Vec<u8> {
    bytemuck::cast_slice(&compile_wgsl_to_words(wgsl_source)).to_vec()
}

/// Instance plus device 0, or `None` when no usable Vulkan device is present.
pub fn gpu_or_skip(test_name: &str) -> Option<(Cgpu, DeviceHandle)> {
    cgpu_common::logging::try_init_logging();

    let mut gpu = match Cgpu::initialize(test_name, AppVersion::new(0, 1, 0)) {
        Ok(gpu) => gpu,
        Err(e) => {
            println!("SKIP {}: no Vulkan instance ({})", test_name, e);
            return None;
        }
    };
    match gpu.create_device(0) {
        Ok(device) => {
            let limits = gpu.device_limits(device).expect("device limits");
            println!("{}: running on {}", test_name, limits.device_name);
            Some((gpu, device))
        }
        Err(e) => {
            println!("SKIP {}: no usable device ({})", test_name, e);
            None
        }
    }
}

/// Little-endian `u32` view of mapped bytes.
pub fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
