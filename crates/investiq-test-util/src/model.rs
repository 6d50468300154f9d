use std::path::PathBuf;

/// Return the model cache directory for tests.
///
/// Checks `INVESTIQ_MODEL_DIR` first, falling back to `~/.investiq/models/`.
pub fn model_dir() -> PathBuf {
    std::env::var("INVESTIQ_MODEL_DIR").map_or_else(
        |_| {
            dirs::home_dir()
                .expect("home dir")
                .join(".investiq")
                .join("models")
        },
        PathBuf::from,
    )
}
