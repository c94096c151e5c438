#[cfg(all(feature = "engine-vision", target_os = "macos"))]
pub mod vision;
