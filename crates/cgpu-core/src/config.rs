use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Top-level cgpu configuration, loaded from cgpu.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CgpuConfig {
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub stores: StoreCapacities,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Application name reported to the driver
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Application version as [major, minor, patch]
    #[serde(default = "default_app_version")]
    pub app_version: [u32; 3],
    /// Enable the Khronos validation layer (None = debug builds only)
    pub validation: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Physical device index used by default
    #[serde(default)]
    pub index: u32,
}

/// Initial slot capacity per resource store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreCapacities {
    #[serde(default = "default_devices")]
    pub devices: usize,
    #[serde(default = "default_shaders")]
    pub shaders: usize,
    #[serde(default = "default_buffers")]
    pub buffers: usize,
    #[serde(default = "default_images")]
    pub images: usize,
    #[serde(default = "default_pipelines")]
    pub pipelines: usize,
    #[serde(default = "default_command_buffers")]
    pub command_buffers: usize,
    #[serde(default = "default_fences")]
    pub fences: usize,
    #[serde(default = "default_samplers")]
    pub samplers: usize,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            validation: None,
        }
    }
}

impl Default for StoreCapacities {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            shaders: default_shaders(),
            buffers: default_buffers(),
            images: default_images(),
            pipelines: default_pipelines(),
            command_buffers: default_command_buffers(),
            fences: default_fences(),
            samplers: default_samplers(),
        }
    }
}

impl InstanceConfig {
    /// Whether validation should be enabled, falling back to the build type.
    pub fn validation_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl CgpuConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring config {}: {}", path, e);
                Self::default()
            }
        }
    }
}

/// Returns the default config file path.
/// Search order:
/// 1. `$CGPU_CONFIG`
/// 2. System-wide config: `/etc/cgpu/cgpu.toml` (not on Windows)
/// 3. Local fallback: `./cgpu.toml`
pub fn default_config_path() -> String {
    if let Ok(path) = std::env::var("CGPU_CONFIG") {
        if !path.is_empty() {
            return path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/cgpu/cgpu.toml";
        if std::path::Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "cgpu.toml".to_string()
}

fn default_app_name() -> String {
    "cgpu".to_string()
}

fn default_app_version() -> [u32; 3] {
    [0, 1, 0]
}

fn default_devices() -> usize {
    1
}

fn default_shaders() -> usize {
    16
}

fn default_buffers() -> usize {
    16
}

fn default_images() -> usize {
    64
}

fn default_pipelines() -> usize {
    8
}

fn default_command_buffers() -> usize {
    16
}

fn default_fences() -> usize {
    8
}

fn default_samplers() -> usize {
    64
}
