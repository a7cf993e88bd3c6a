//! Interactive prompts using dialoguer

use std::path::Path;

use anyhow::Result;
use dialoguer::Confirm;

/// Ask before writing into an existing output directory
pub fn confirm_overwrite(dir: &Path) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Output directory {} already exists. Overwrite its contents?",
            dir.display()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}
