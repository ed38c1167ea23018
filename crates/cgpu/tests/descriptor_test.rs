//! Integration test: descriptor layout synthesis
//!
//! Pool sizing, layout bindings, push constant ranges and storage buffer
//! offset alignment, computed from hand-built reflection records.
//!
//! Run with: cargo test -p cgpu --test descriptor_test

use ash::vk;
use cgpu::descriptor::{
    check_storage_buffer_offset, descriptor_pool_sizes, layout_bindings, push_constant_ranges,
};
use cgpu::{CgpuError, ReflectedBinding, ShaderReflection};

fn reflection(types: &[(u32, vk::DescriptorType)]) -> ShaderReflection {
    ShaderReflection {
        bindings: types
            .iter()
            .map(|&(binding, descriptor_type)| ReflectedBinding {
                binding,
                count: 1,
                descriptor_type,
                read_access: true,
                write_access: false,
            })
            .collect(),
        push_constants_size: 0,
    }
}

#[test]
fn test_pool_sizes_cover_only_used_types() {
    let r = reflection(&[
        (0, vk::DescriptorType::STORAGE_BUFFER),
        (1, vk::DescriptorType::STORAGE_BUFFER),
        (4, vk::DescriptorType::STORAGE_IMAGE),
    ]);
    let sizes = descriptor_pool_sizes(&r).unwrap();
    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_BUFFER);
    assert_eq!(sizes[0].descriptor_count, 2);
    assert_eq!(sizes[1].ty, vk::DescriptorType::STORAGE_IMAGE);
    assert_eq!(sizes[1].descriptor_count, 1);
}

#[test]
fn test_pool_sizes_follow_table_order() {
    let r = reflection(&[
        (0, vk::DescriptorType::SAMPLER),
        (1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        (2, vk::DescriptorType::SAMPLED_IMAGE),
        (3, vk::DescriptorType::SAMPLED_IMAGE),
    ]);
    let types: Vec<(vk::DescriptorType, u32)> = descriptor_pool_sizes(&r)
        .unwrap()
        .iter()
        .map(|s| (s.ty, s.descriptor_count))
        .collect();
    assert_eq!(
        types,
        vec![
            (vk::DescriptorType::SAMPLED_IMAGE, 2),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1),
            (vk::DescriptorType::SAMPLER, 1),
        ]
    );
}

#[test]
fn test_no_bindings_means_no_pool() {
    let sizes = descriptor_pool_sizes(&ShaderReflection::default()).unwrap();
    assert!(sizes.is_empty());
    assert!(layout_bindings(&ShaderReflection::default()).is_empty());
}

#[test]
fn test_uniform_buffer_is_not_pooled() {
    let r = reflection(&[
        (0, vk::DescriptorType::STORAGE_BUFFER),
        (1, vk::DescriptorType::UNIFORM_BUFFER),
    ]);
    match descriptor_pool_sizes(&r) {
        Err(CgpuError::UnsupportedDescriptorType {
            binding,
            descriptor_type,
        }) => {
            assert_eq!(binding, 1);
            assert_eq!(descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        }
        other => panic!("expected UnsupportedDescriptorType, got {:?}", other),
    }
}

#[test]
fn test_layout_bindings_force_single_descriptor() {
    let mut r = reflection(&[
        (2, vk::DescriptorType::STORAGE_BUFFER),
        (7, vk::DescriptorType::STORAGE_IMAGE),
    ]);
    r.bindings[1].count = 4;

    let bindings = layout_bindings(&r);
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].binding, 2);
    assert_eq!(bindings[1].binding, 7);
    assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
    assert!(bindings.iter().all(|b| b.descriptor_count == 1));
    assert!(bindings
        .iter()
        .all(|b| b.stage_flags == vk::ShaderStageFlags::COMPUTE));
}

#[test]
fn test_push_constant_range() {
    assert!(push_constant_ranges(0).is_empty());

    let ranges = push_constant_ranges(16);
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].offset, 0);
    assert_eq!(ranges[0].size, 16);
    assert_eq!(ranges[0].stage_flags, vk::ShaderStageFlags::COMPUTE);
}

#[test]
fn test_storage_buffer_offset_alignment() {
    let alignment = 64;
    assert!(check_storage_buffer_offset(0, alignment).is_ok());
    assert!(check_storage_buffer_offset(alignment, alignment).is_ok());
    assert!(check_storage_buffer_offset(3 * alignment, alignment).is_ok());

    match check_storage_buffer_offset(alignment - 1, alignment) {
        Err(CgpuError::BufferOffsetNotAligned { offset, alignment: a }) => {
            assert_eq!(offset, alignment - 1);
            assert_eq!(a, alignment);
        }
        other => panic!("expected BufferOffsetNotAligned, got {:?}", other),
    }

    // Alignment of zero is treated as no constraint.
    assert!(check_storage_buffer_offset(13, 0).is_ok());
}
