//! Per-image layout and access tracking for dispatch-time barriers.

use std::collections::BTreeMap;

use ash::vk;

use cgpu_core::{ImageHandle, ResourceStore};

use crate::error::{CgpuError, Result};
use crate::reflection::{ReflectedBinding, ShaderReflection};

/// Layout and access mask an image was last transitioned to by recorded commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageState {
    pub layout: vk::ImageLayout,
    pub access: vk::AccessFlags,
}

impl Default for ImageState {
    fn default() -> Self {
        Self {
            layout: vk::ImageLayout::UNDEFINED,
            access: vk::AccessFlags::empty(),
        }
    }
}

/// Anything carrying a tracked [`ImageState`].
pub trait TrackedImage {
    fn state(&self) -> ImageState;
    fn set_state(&mut self, state: ImageState);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub image: ImageHandle,
    pub old: ImageState,
    pub new: ImageState,
}

/// Layout an image must be in for a descriptor of this type, or `None` for non-image descriptors.
pub fn required_layout(descriptor_type: vk::DescriptorType) -> Option<vk::ImageLayout> {
    match descriptor_type {
        vk::DescriptorType::SAMPLED_IMAGE | vk::DescriptorType::COMBINED_IMAGE_SAMPLER => {
            Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        }
        vk::DescriptorType::STORAGE_IMAGE => Some(vk::ImageLayout::GENERAL),
        _ => None,
    }
}

pub fn shader_access(binding: &ReflectedBinding) -> vk::AccessFlags {
    let mut access = vk::AccessFlags::empty();
    if binding.read_access {
        access |= vk::AccessFlags::SHADER_READ;
    }
    if binding.write_access {
        access |= vk::AccessFlags::SHADER_WRITE;
    }
    access
}

/// Work out the transitions needed before a dispatch and apply them to the tracked state.
///
/// Images already in their required layout are skipped. Every binding is checked
/// before any state changes, so an error leaves the tracked state untouched.
/// Planning again without intervening commands yields nothing.
pub fn plan_shader_transitions<T: TrackedImage>(
    reflection: &ShaderReflection,
    bound_images: &BTreeMap<u32, ImageHandle>,
    images: &mut ResourceStore<ImageHandle, T>,
) -> Result<Vec<LayoutTransition>> {
    let mut transitions = Vec::new();
    let mut pending: BTreeMap<ImageHandle, ImageState> = BTreeMap::new();

    for binding in &reflection.bindings {
        let Some(layout) = required_layout(binding.descriptor_type) else {
            continue;
        };

        let handle = *bound_images
            .get(&binding.binding)
            .ok_or(CgpuError::DescriptorSetBindingMismatch {
                binding: binding.binding,
            })?;
        let old = match pending.get(&handle) {
            Some(state) => *state,
            None => images.resolve(handle)?.state(),
        };
        if old.layout == layout {
            continue;
        }

        let new = ImageState {
            layout,
            access: shader_access(binding),
        };
        pending.insert(handle, new);
        transitions.push(LayoutTransition { image: handle, old, new });
    }

    for (handle, state) in pending {
        images.resolve_mut(handle)?.set_state(state);
    }
    Ok(transitions)
}

pub(crate) fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) fn image_barrier(
    image: vk::Image,
    old: ImageState,
    new: ImageState,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_access_mask(old.access)
        .dst_access_mask(new.access)
        .old_layout(old.layout)
        .new_layout(new.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
}
