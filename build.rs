// build.rs - Build metadata for mod-alarm
//
// Records the build time so the status report can show which build is
// running.

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!(
        "cargo:rustc-env=MOD_ALARM_BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );
}
