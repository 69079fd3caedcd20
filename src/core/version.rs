//! Build metadata generated by the build script

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// Target triple the binary was compiled for
pub fn build_target() -> &'static str {
    BUILD_TARGET
}

/// One-line banner for the startup log
pub fn banner() -> String {
    format!(
        "{} {} for {} (built {}, commit {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        build_target(),
        build_time(),
        git_hash()
    )
}
