use std::{env, path::PathBuf};

const LIBRARY_FILES: [&str; 2] = ["libonnxruntime.so", "libonnxruntime.dylib"];

const SYSTEM_PATHS: [&str; 7] = [
    "/usr/local/lib",
    "/usr/lib",
    "/usr/lib64",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/lib/x86_64-linux-gnu",
    "/opt/homebrew/lib",
];

// Search order: ONNXRUNTIME_DIR/lib, ONNXRUNTIME_LIB_DIR, pkg-config, system paths.
fn find_library_dir() -> Option<String> {
    if let Ok(dir) = env::var("ONNXRUNTIME_DIR") {
        return Some(PathBuf::from(dir).join("lib").display().to_string());
    }

    if let Ok(lib_dir) = env::var("ONNXRUNTIME_LIB_DIR") {
        return Some(lib_dir);
    }

    if let Ok(output) = std::process::Command::new("pkg-config")
        .args(["--libs-only-L", "libonnxruntime"])
        .output()
    {
        if output.status.success() {
            let libs = String::from_utf8_lossy(&output.stdout);
            if let Some(path) = libs.split_whitespace().find_map(|lib| lib.strip_prefix("-L")) {
                return Some(path.to_string());
            }
        }
    }

    SYSTEM_PATHS
        .iter()
        .find(|path| {
            LIBRARY_FILES
                .iter()
                .any(|file| PathBuf::from(path).join(file).exists())
        })
        .map(|path| path.to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=ONNXRUNTIME_DIR");
    println!("cargo:rerun-if-env-changed=ONNXRUNTIME_LIB_DIR");

    match find_library_dir() {
        Some(dir) => {
            println!("cargo:rustc-link-search=native={}", dir);
            println!("cargo:rustc-link-lib=onnxruntime");
        }
        None => {
            // Code that never reaches the runtime (unit tests, ffi layout checks) still links.
            println!(
                "cargo:warning=Could not find the onnxruntime library. Set ONNXRUNTIME_DIR or ONNXRUNTIME_LIB_DIR."
            );
        }
    }
}
