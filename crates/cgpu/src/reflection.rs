//! SPIR-V reflection into the record that drives layout synthesis.

use std::collections::BTreeMap;

use ash::vk;
use spirq::ty::{AccessType, DescriptorType};
use spirq::var::Variable;

/// One resource binding of the shader's single descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub binding: u32,
    pub count: u32,
    pub descriptor_type: vk::DescriptorType,
    pub read_access: bool,
    pub write_access: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Sorted by binding index.
    pub bindings: Vec<ReflectedBinding>,
    pub push_constants_size: u32,
}

impl ShaderReflection {
    pub fn binding(&self, binding: u32) -> Option<&ReflectedBinding> {
        self.bindings
            .binary_search_by_key(&binding, |b| b.binding)
            .ok()
            .map(|i| &self.bindings[i])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("SPIR-V parse failed: {0}")]
    Parse(String),

    #[error("no entry point in module")]
    NoEntryPoint,

    #[error("binding {binding} uses descriptor set {set}, only set 0 is supported")]
    UnsupportedSet { set: u32, binding: u32 },

    #[error("binding {binding} has an unrecognized descriptor type {desc_ty}")]
    UnknownDescriptorType { binding: u32, desc_ty: String },

    #[error("push constant block has no fixed size")]
    UnsizedPushConstants,
}

fn descriptor_access(binding: u32, desc_ty: &DescriptorType) -> Result<(vk::DescriptorType, bool, bool), ReflectionError> {
    let from_access = |access: &AccessType| match access {
        AccessType::ReadOnly => (true, false),
        AccessType::WriteOnly => (false, true),
        AccessType::ReadWrite => (true, true),
    };

    let (ty, (read, write)) = match desc_ty {
        DescriptorType::Sampler(..) => (vk::DescriptorType::SAMPLER, (true, false)),
        DescriptorType::CombinedImageSampler(..) => {
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, (true, false))
        }
        DescriptorType::SampledImage(..) => (vk::DescriptorType::SAMPLED_IMAGE, (true, false)),
        DescriptorType::StorageImage(access) => (vk::DescriptorType::STORAGE_IMAGE, from_access(access)),
        DescriptorType::UniformBuffer(..) => (vk::DescriptorType::UNIFORM_BUFFER, (true, false)),
        DescriptorType::StorageBuffer(access) => {
            (vk::DescriptorType::STORAGE_BUFFER, from_access(access))
        }
        DescriptorType::UniformTexelBuffer(..) => {
            (vk::DescriptorType::UNIFORM_TEXEL_BUFFER, (true, false))
        }
        DescriptorType::StorageTexelBuffer(access) => {
            (vk::DescriptorType::STORAGE_TEXEL_BUFFER, from_access(access))
        }
        other => {
            return Err(ReflectionError::UnknownDescriptorType {
                binding,
                desc_ty: format!("{:?}", other),
            })
        }
    };
    Ok((ty, read, write))
}

/// Reflect every entry point of a module. Bindings declared by several entry
/// points are merged, with their access flags combined.
pub fn reflect_spirv(words: &[u32]) -> Result<ShaderReflection, ReflectionError> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| ReflectionError::Parse(format!("{:?}", e)))?;

    if entry_points.is_empty() {
        return Err(ReflectionError::NoEntryPoint);
    }

    let mut bindings: BTreeMap<u32, ReflectedBinding> = BTreeMap::new();
    let mut push_constants_size = 0u32;

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                Variable::Descriptor {
                    desc_bind,
                    desc_ty,
                    nbind,
                    ..
                } => {
                    let binding = desc_bind.bind();
                    if desc_bind.set() != 0 {
                        return Err(ReflectionError::UnsupportedSet {
                            set: desc_bind.set(),
                            binding,
                        });
                    }
                    let (descriptor_type, read_access, write_access) =
                        descriptor_access(binding, desc_ty)?;

                    let entry = bindings.entry(binding).or_insert(ReflectedBinding {
                        binding,
                        count: (*nbind).max(1),
                        descriptor_type,
                        read_access: false,
                        write_access: false,
                    });
                    entry.read_access |= read_access;
                    entry.write_access |= write_access;
                }
                Variable::PushConstant { ty, .. } => {
                    let size = ty.nbyte().ok_or(ReflectionError::UnsizedPushConstants)?;
                    push_constants_size = push_constants_size.max(size as u32);
                }
                _ => {}
            }
        }
    }

    Ok(ShaderReflection {
        bindings: bindings.into_values().collect(),
        push_constants_size,
    })
}
