//! Config commands

use std::path::Path;

use anyhow::{Context, Result, bail};
use faceindex::config::Config;

/// Show the effective configuration and where it came from
pub fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
  let config = Config::load(config_path);

  match (config_path, Config::user_config_path()) {
    (Some(path), _) if path.exists() => println!("Using config: {}", path.display()),
    (_, Some(user_path)) if user_path.exists() => println!("Using user config: {}", user_path.display()),
    _ => println!("Using default configuration (no config file found)"),
  }
  println!();

  let toml_str = toml::to_string_pretty(&config)?;
  println!("{}", toml_str);

  Ok(())
}

/// Write the default user configuration file
pub fn cmd_config_init(force: bool) -> Result<()> {
  let Some(config_path) = Config::user_config_path() else {
    bail!("Could not determine the user config directory");
  };

  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {} (use --force to overwrite)",
      config_path.display()
    );
  }

  if let Some(parent) = config_path.parent() {
    std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created user config: {}", config_path.display());
  println!("Set [library] root to your photo directory, then run `faceindex run`.");

  Ok(())
}
