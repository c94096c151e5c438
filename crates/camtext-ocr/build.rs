#[cfg(target_os = "macos")]
fn build_vision_bridge() {
    if std::env::var_os("CARGO_FEATURE_ENGINE_VISION").is_none() {
        return;
    }
    println!("cargo:rerun-if-changed=src/macos/vision_ocr_bridge.m");
    println!("cargo:rerun-if-env-changed=MACOSX_DEPLOYMENT_TARGET");

    cc::Build::new()
        .file("src/macos/vision_ocr_bridge.m")
        .flag("-fobjc-arc")
        .compile("camtext_vision_bridge");

    for framework in ["Vision", "CoreGraphics", "CoreFoundation", "Foundation"] {
        println!("cargo:rustc-link-lib=framework={framework}");
    }
}

#[cfg(not(target_os = "macos"))]
fn build_vision_bridge() {}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    build_vision_bridge();
}
