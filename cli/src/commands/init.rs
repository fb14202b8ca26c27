use std::path::Path;

use anyhow::bail;

use crate::{app_config::AppConfig, args::InitArgs};

pub fn init_cmd(config: &AppConfig, profile_path: &Path, args: InitArgs) -> anyhow::Result<()> {
    if profile_path.exists() && !args.force {
        bail!(
            "Profile already exists at {} (use --force to overwrite)",
            profile_path.display()
        );
    }

    config.to_profile().save(profile_path)?;
    println!("Profile written to {}", profile_path.display());

    Ok(())
}
