// build.rs
fn main() {
    // Generate build info (VERGEN_BUILD_TIMESTAMP, VERGEN_GIT_SHA) for the
    // exporter build_info metric
    vergen::EmitBuilder::builder()
        .all_build()
        .all_git()
        .emit()
        .expect("Unable to generate build info");
}
