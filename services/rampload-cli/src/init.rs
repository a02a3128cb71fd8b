//! `rampload init`

use anyhow::{bail, Context};
use rampload_core::SAMPLE_SCENARIO;
use std::path::Path;

pub fn write_sample(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }

    std::fs::write(path, SAMPLE_SCENARIO)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("📝 Wrote sample scenario to {}", path.display());
    println!("   Start the target with `rampload-target` and run `rampload run {}`", path.display());
    Ok(())
}
