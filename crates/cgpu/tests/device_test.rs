//! Integration test: instance and device lifecycle
//!
//! Requires a Vulkan 1.1 driver with subgroup and descriptor indexing support.
//! Each test prints SKIP and returns when none is available.
//!
//! Run with: cargo test -p cgpu --test device_test -- --nocapture

mod common;

use cgpu::{
    BufferBinding, BufferUsage, CgpuError, MemoryProperties, ResourceBindings,
    MAX_TIMESTAMP_QUERIES,
};
use cgpu_core::CoreError;

#[test]
fn test_device_limits_and_features() {
    let Some((mut gpu, device)) = common::gpu_or_skip("test_device_limits_and_features") else {
        return;
    };

    let count = gpu.device_count().expect("device count");
    assert!(count >= 1);

    let limits = gpu.device_limits(device).expect("limits");
    println!("limits: {:#?}", limits);
    assert!(!limits.device_name.is_empty());
    assert!(limits.subgroup_size >= 1);
    assert!(limits.min_storage_buffer_offset_alignment >= 1);
    assert!(limits.non_coherent_atom_size >= 1);
    assert!(limits.max_compute_work_group_invocations >= 128);

    let features = gpu.device_features(device).expect("features");
    println!("features: {:?}", features);

    gpu.queue_family_index(device).expect("queue family");
    assert_eq!(gpu.live_handle_count(), 1);

    gpu.destroy_device(device).expect("destroy device");
    assert_eq!(gpu.live_handle_count(), 0);
    gpu.terminate();
}

#[test]
fn test_device_index_out_of_range() {
    let Some((mut gpu, device)) = common::gpu_or_skip("test_device_index_out_of_range") else {
        return;
    };
    let count = gpu.device_count().expect("device count");

    match gpu.create_device(count) {
        Err(CgpuError::NoDeviceAtIndex { index, count: available }) => {
            assert_eq!(index, count);
            assert_eq!(available, count as usize);
        }
        other => panic!("expected NoDeviceAtIndex, got {:?}", other),
    }
    assert_eq!(gpu.live_handle_count(), 1);

    gpu.destroy_device(device).expect("destroy device");
}

#[test]
fn test_destroyed_device_handle_is_stale() {
    let Some((mut gpu, device)) = common::gpu_or_skip("test_destroyed_device_handle_is_stale") else {
        return;
    };

    gpu.destroy_device(device).expect("destroy device");

    match gpu.destroy_device(device) {
        Err(CgpuError::Core(CoreError::InvalidHandle { kind, .. })) => assert_eq!(kind, "device"),
        other => panic!("expected InvalidHandle, got {:?}", other),
    }
    match gpu.device_limits(device) {
        Err(CgpuError::Core(CoreError::InvalidHandle { .. })) => {}
        other => panic!("expected InvalidHandle, got {:?}", other),
    }

    // A fresh device may reuse the slot without reviving the old handle.
    let again = gpu.create_device(0).expect("recreate device");
    assert_ne!(again, device);
    assert!(gpu.device_limits(device).is_err());
    gpu.destroy_device(again).expect("destroy device");
}

#[test]
fn test_stale_fence_and_timestamp_limit() {
    let Some((mut gpu, device)) = common::gpu_or_skip("test_stale_fence_and_timestamp_limit") else {
        return;
    };

    let fence = gpu.create_fence(device).expect("fence");
    gpu.destroy_fence(device, fence).expect("destroy fence");
    assert!(gpu.reset_fence(device, fence).is_err());
    assert!(gpu.destroy_fence(device, fence).is_err());

    let cmd = gpu.create_command_buffer(device).expect("command buffer");
    match gpu.cmd_reset_timestamps(cmd, 0, MAX_TIMESTAMP_QUERIES + 1) {
        Err(CgpuError::LimitExceeded { limit, .. }) => {
            assert_eq!(limit, MAX_TIMESTAMP_QUERIES as usize)
        }
        other => panic!("expected LimitExceeded, got {:?}", other),
    }
    gpu.destroy_command_buffer(device, cmd).expect("destroy command buffer");

    gpu.destroy_device(device).expect("destroy device");
    assert_eq!(gpu.live_handle_count(), 0);
}

#[test]
fn test_resources_stay_on_their_device() {
    let Some((mut gpu, first)) = common::gpu_or_skip("test_resources_stay_on_their_device") else {
        return;
    };
    let second = gpu.create_device(0).expect("second device");

    let buffer = gpu
        .create_buffer(
            first,
            BufferUsage::STORAGE | BufferUsage::TRANSFER_DST,
            MemoryProperties::DEVICE_LOCAL,
            64,
        )
        .expect("buffer");
    let fence = gpu.create_fence(first).expect("fence");
    let shader = gpu
        .create_shader(second, &common::compile_wgsl(common::DOUBLE_WGSL))
        .expect("shader");
    let pipeline = gpu
        .create_compute_pipeline(second, shader, "main")
        .expect("pipeline");
    let cmd = gpu.create_command_buffer(second).expect("command buffer");

    // Recording on the second device cannot touch the first device's buffer.
    gpu.begin_command_buffer(cmd).expect("begin");
    match gpu.cmd_update_buffer(cmd, buffer, 0, &[1u32; 4]) {
        Err(CgpuError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
    gpu.end_command_buffer(cmd).expect("end");

    let foreign = [BufferBinding {
        binding: 0,
        buffer,
        offset: 0,
        size: cgpu::WHOLE_SIZE,
    }];
    match gpu.update_resources(
        second,
        pipeline,
        &ResourceBindings {
            buffers: &foreign,
            ..Default::default()
        },
    ) {
        Err(CgpuError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
    match gpu.update_resources(first, pipeline, &ResourceBindings::default()) {
        Err(CgpuError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
    match gpu.submit_command_buffer(second, cmd, fence) {
        Err(CgpuError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
    assert!(gpu.destroy_buffer(second, buffer).is_err());
    assert!(gpu.reset_fence(second, fence).is_err());

    gpu.destroy_command_buffer(second, cmd).expect("destroy command buffer");
    gpu.destroy_pipeline(second, pipeline).expect("destroy pipeline");
    gpu.destroy_shader(second, shader).expect("destroy shader");
    gpu.destroy_fence(first, fence).expect("destroy fence");
    gpu.destroy_buffer(first, buffer).expect("destroy buffer");
    gpu.destroy_device(second).expect("destroy second device");
    gpu.destroy_device(first).expect("destroy first device");
    assert_eq!(gpu.live_handle_count(), 0);
}
