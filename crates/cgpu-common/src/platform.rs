/// Returns the platform name string.
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "windows" }
    #[cfg(target_os = "linux")]
    { "linux" }
    #[cfg(target_os = "macos")]
    { "macos" }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    { "unknown" }
}

/// Whether Vulkan on this platform runs through a portability layer (MoltenVK),
/// which hides devices unless portability enumeration is requested.
pub fn uses_portability_layer() -> bool {
    cfg!(any(target_os = "macos", target_os = "ios"))
}

/// Whether the debug-only shader non-semantic info extension may be enabled.
/// It is never requested on portability platforms.
pub fn allows_non_semantic_info() -> bool {
    cfg!(debug_assertions) && !uses_portability_layer()
}
