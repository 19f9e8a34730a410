use std::path::Path;

/// Load `.env` from the crate directory, then from the working directory.
///
/// Variables already set in the environment win; missing files are ignored.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}
