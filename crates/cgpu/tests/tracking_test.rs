//! Integration test: image layout tracking
//!
//! Drives the dispatch-time transition planner against plain in-memory images,
//! no device required.
//!
//! Run with: cargo test -p cgpu --test tracking_test -- --nocapture

use std::collections::BTreeMap;

use ash::vk;
use cgpu::tracking::{plan_shader_transitions, required_layout, ImageState, TrackedImage};
use cgpu::{CgpuError, ImageHandle, ReflectedBinding, ShaderReflection};
use cgpu_core::ResourceStore;

#[derive(Default)]
struct FakeImage {
    state: ImageState,
}

impl TrackedImage for FakeImage {
    fn state(&self) -> ImageState {
        self.state
    }

    fn set_state(&mut self, state: ImageState) {
        self.state = state;
    }
}

fn binding(index: u32, descriptor_type: vk::DescriptorType, read: bool, write: bool) -> ReflectedBinding {
    ReflectedBinding {
        binding: index,
        count: 1,
        descriptor_type,
        read_access: read,
        write_access: write,
    }
}

fn storage_and_sampled() -> ShaderReflection {
    ShaderReflection {
        bindings: vec![
            binding(0, vk::DescriptorType::STORAGE_BUFFER, true, false),
            binding(1, vk::DescriptorType::STORAGE_IMAGE, false, true),
            binding(2, vk::DescriptorType::SAMPLED_IMAGE, true, false),
        ],
        push_constants_size: 0,
    }
}

#[test]
fn test_required_layouts() {
    assert_eq!(
        required_layout(vk::DescriptorType::STORAGE_IMAGE),
        Some(vk::ImageLayout::GENERAL)
    );
    assert_eq!(
        required_layout(vk::DescriptorType::SAMPLED_IMAGE),
        Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    );
    assert_eq!(
        required_layout(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    );
    assert_eq!(required_layout(vk::DescriptorType::STORAGE_BUFFER), None);
    assert_eq!(required_layout(vk::DescriptorType::SAMPLER), None);
}

#[test]
fn test_first_dispatch_transitions_then_idempotent() {
    let mut images: ResourceStore<ImageHandle, FakeImage> = ResourceStore::new();
    let storage = images.allocate(FakeImage::default());
    let sampled = images.allocate(FakeImage::default());
    let bound = BTreeMap::from([(1, storage), (2, sampled)]);
    let reflection = storage_and_sampled();

    let transitions = plan_shader_transitions(&reflection, &bound, &mut images).unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].image, storage);
    assert_eq!(transitions[0].old.layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(transitions[0].new.layout, vk::ImageLayout::GENERAL);
    assert_eq!(transitions[0].new.access, vk::AccessFlags::SHADER_WRITE);
    assert_eq!(transitions[1].image, sampled);
    assert_eq!(transitions[1].new.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(transitions[1].new.access, vk::AccessFlags::SHADER_READ);

    assert_eq!(images.get(storage).unwrap().state.layout, vk::ImageLayout::GENERAL);
    assert_eq!(
        images.get(sampled).unwrap().state.layout,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );

    let again = plan_shader_transitions(&reflection, &bound, &mut images).unwrap();
    assert!(again.is_empty(), "second plan should be a no-op, got {:?}", again);
}

#[test]
fn test_image_already_in_layout_is_skipped() {
    let mut images: ResourceStore<ImageHandle, FakeImage> = ResourceStore::new();
    let storage = images.allocate(FakeImage {
        state: ImageState {
            layout: vk::ImageLayout::GENERAL,
            access: vk::AccessFlags::TRANSFER_WRITE,
        },
    });
    let reflection = ShaderReflection {
        bindings: vec![binding(3, vk::DescriptorType::STORAGE_IMAGE, true, true)],
        push_constants_size: 0,
    };
    let bound = BTreeMap::from([(3, storage)]);

    let transitions = plan_shader_transitions(&reflection, &bound, &mut images).unwrap();
    assert!(transitions.is_empty());
    assert_eq!(
        images.get(storage).unwrap().state.access,
        vk::AccessFlags::TRANSFER_WRITE
    );
}

#[test]
fn test_missing_binding_leaves_state_untouched() {
    let mut images: ResourceStore<ImageHandle, FakeImage> = ResourceStore::new();
    let storage = images.allocate(FakeImage::default());
    // Binding 2 is declared by the shader but nothing was bound there.
    let bound = BTreeMap::from([(1, storage)]);

    match plan_shader_transitions(&storage_and_sampled(), &bound, &mut images) {
        Err(CgpuError::DescriptorSetBindingMismatch { binding }) => assert_eq!(binding, 2),
        other => panic!("expected DescriptorSetBindingMismatch, got {:?}", other),
    }
    assert_eq!(images.get(storage).unwrap().state, ImageState::default());
}

#[test]
fn test_stale_image_handle_is_rejected() {
    let mut images: ResourceStore<ImageHandle, FakeImage> = ResourceStore::new();
    let storage = images.allocate(FakeImage::default());
    images.free(storage).unwrap();
    let bound = BTreeMap::from([(1, storage)]);
    let reflection = ShaderReflection {
        bindings: vec![binding(1, vk::DescriptorType::STORAGE_IMAGE, false, true)],
        push_constants_size: 0,
    };

    match plan_shader_transitions(&reflection, &bound, &mut images) {
        Err(CgpuError::Core(_)) => {}
        other => panic!("expected invalid handle, got {:?}", other),
    }
}
