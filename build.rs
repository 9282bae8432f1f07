#![forbid(unsafe_code)]

fn main() {
    // Values that can't be read (e.g. building outside a git checkout) are
    // left unset and main reports them as "unknown".
    set_env("GIT_BRANCH", build_data::get_git_branch());
    set_env("GIT_COMMIT_SHORT", build_data::get_git_commit_short());
    set_env("GIT_DIRTY", build_data::get_git_dirty().map(|d| d.to_string()));
    // Using BUILD_TIMESTAMP makes build unreproducible.
    set_env("SOURCE_TIMESTAMP", build_data::get_source_time().map(build_data::format_timestamp));
    set_env("RUSTC_VERSION", build_data::get_rustc_version());

    // Tells cargo not to rebuild build.rs during debug builds when other files change.
    // This speeds up development builds.
    //build_data::no_debug_rebuilds();
}

fn set_env(name: &str, value: Result<String, String>) {
    match value {
        Ok(v) => println!("cargo:rustc-env={}={}", name, v),
        Err(e) => println!("cargo:warning={} not set: {}", name, e),
    }
}
