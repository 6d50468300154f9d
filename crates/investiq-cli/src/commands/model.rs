use std::io::{Read, Write};

use anyhow::Context;

use investiq_lib::embedding::LocalEmbedder;
use investiq_lib::embedding::embedder::{MODEL_FILES, MODEL_SUBDIR};
use investiq_lib::output::ConsoleIO;
use investiq_lib::runtime::Runtime;

/// Hugging Face repository for the GTE multilingual base model.
const HF_REPO: &str = "onnx-community/gte-multilingual-base";

/// Path of a model file inside the Hugging Face repository.
fn remote_path(local_name: &str) -> String {
    if local_name.ends_with(".onnx") {
        format!("onnx/{local_name}")
    } else {
        local_name.to_string()
    }
}

/// Run the `investiq model download` command.
pub fn run_model_download<IN, OUT, ERR>(
    force: bool,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let cache_dir = runtime.context.model_cache_dir();
    let model_dir = cache_dir.join(MODEL_SUBDIR);

    if force && model_dir.exists() {
        writeln!(io.stderr(), "Removing existing model files...")?;
        std::fs::remove_dir_all(&model_dir)
            .with_context(|| format!("Failed to remove {}", model_dir.display()))?;
    }

    if !force && LocalEmbedder::is_downloaded(&cache_dir) {
        writeln!(
            io.stdout(),
            "Model already downloaded at {}",
            model_dir.display()
        )?;
        return Ok(());
    }

    std::fs::create_dir_all(&model_dir)
        .with_context(|| format!("Failed to create {}", model_dir.display()))?;

    writeln!(io.stderr(), "Downloading GTE multilingual base int8...")?;
    let api = hf_hub::api::sync::Api::new().context("Failed to initialize Hugging Face client")?;
    let repo = api.model(HF_REPO.to_string());

    for local_name in MODEL_FILES {
        let dest = model_dir.join(local_name);
        if dest.exists() {
            writeln!(io.stderr(), "  {local_name} (cached)")?;
            continue;
        }
        writeln!(io.stderr(), "  {local_name}...")?;
        let remote = remote_path(local_name);
        let cached = repo
            .get(&remote)
            .with_context(|| format!("Failed to download {remote} from {HF_REPO}"))?;
        std::fs::copy(&cached, &dest)
            .with_context(|| format!("Failed to copy {local_name} into {}", model_dir.display()))?;
    }

    writeln!(io.stdout(), "Model downloaded to {}", model_dir.display())?;
    Ok(())
}
