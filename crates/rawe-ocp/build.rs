//! Build script for rawe-ocp
//!
//! With the `acados` feature, compiles the exported real-time solver sources
//! found in `OCPRT_EXPORT_DIR` (the generated C code plus its
//! `py_*` exchange shims) into a static library.

#[cfg(feature = "acados")]
use std::env;
#[cfg(feature = "acados")]
use std::path::{Path, PathBuf};

fn main() {
    #[cfg(not(feature = "acados"))]
    {
        println!("cargo:warning=acados feature not enabled, skipping real-time solver compilation");
    }

    #[cfg(feature = "acados")]
    build_export();
}

#[cfg(feature = "acados")]
fn sources(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == ext).unwrap_or(false))
        .collect();
    files.sort();
    files
}

#[cfg(feature = "acados")]
fn build_export() {
    println!("cargo:rerun-if-env-changed=OCPRT_EXPORT_DIR");
    println!("cargo:rerun-if-env-changed=ACADO_INCLUDE_DIR");

    let Ok(export_dir) = env::var("OCPRT_EXPORT_DIR") else {
        println!("cargo:warning=OCPRT_EXPORT_DIR not set");
        println!("cargo:warning=Point it at the exported solver directory");
        println!("cargo:warning=Skipping real-time solver compilation");
        return;
    };
    let export_dir = PathBuf::from(export_dir);
    if !export_dir.exists() {
        println!("cargo:warning=Exported solver not found at {:?}", export_dir);
        println!("cargo:warning=Skipping real-time solver compilation");
        return;
    }

    // qpOASES sources ship inside the export
    let mut dirs = vec![export_dir.clone()];
    for sub in ["qpoases", "qpoases/SRC"] {
        let dir = export_dir.join(sub);
        if dir.exists() {
            dirs.push(dir);
        }
    }

    // the exchange shims must keep C linkage, so C and C++ sources are
    // compiled separately
    let c_files: Vec<PathBuf> = dirs.iter().flat_map(|d| sources(d, "c")).collect();
    let cpp_files: Vec<PathBuf> = dirs.iter().flat_map(|d| sources(d, "cpp")).collect();
    if c_files.is_empty() {
        println!("cargo:warning=No C sources found in {:?}", export_dir);
        return;
    }

    compile(&dirs, &c_files, false, "ocprt_export");
    if !cpp_files.is_empty() {
        compile(&dirs, &cpp_files, true, "ocprt_qpoases");
    }
    println!("cargo:rustc-link-lib=m");
}

#[cfg(feature = "acados")]
fn compile(dirs: &[PathBuf], files: &[PathBuf], cpp: bool, name: &str) {
    let mut build = cc::Build::new();
    build.cpp(cpp).opt_level(3).warnings(false);
    for dir in dirs {
        build.include(dir);
    }
    if let Ok(include) = env::var("ACADO_INCLUDE_DIR") {
        build.include(include);
    }
    for file in files {
        build.file(file);
        println!("cargo:rerun-if-changed={}", file.display());
    }
    build.compile(name);
}
