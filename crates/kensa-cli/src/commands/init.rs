//! Init command - writes a starter kensa.toml

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kensa_core::config::CONFIG_FILENAME;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_CONFIG: &str = r#"# Kensa configuration file

# Rule configuration
[rules]
# Disable rules by id or name
# disabled = ["constant-condition"]

# Override rule severity
# [rules.severity]
# B003 = "error"

# Bounds on the work done per analyzed function
[engine]
# Times a path may go around a loop before its values are widened
max_loop_iterations = 2
# Distinct program states explored before exploration degrades
max_path_states = 1000
# Blocks executed before the analysis of a function is abandoned
max_steps = 10000
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(&self) -> Result<()> {
        write_config(Path::new(CONFIG_FILENAME), self.force)?;
        println!(
            "{} Created {} configuration file",
            "✓".green().bold(),
            CONFIG_FILENAME.cyan()
        );
        Ok(())
    }
}

fn write_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file '{}' already exists. Use --force to overwrite.",
            path.display()
        );
    }

    fs::write(path, DEFAULT_CONFIG)?;
    debug!(path = %path.display(), "wrote default config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kensa_core::config::{EngineConfig, load_config_with_warnings};
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid_toml() {
        let parsed: Result<toml::Table, _> = DEFAULT_CONFIG.parse();
        assert!(parsed.is_ok(), "DEFAULT_CONFIG should be valid TOML");
    }

    #[test]
    fn default_config_loads_without_warnings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        write_config(&path, false).unwrap();

        let result = load_config_with_warnings(&path).unwrap();

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!(result.config.rules.disabled.is_empty());
        assert_eq!(result.config.engine, EngineConfig::default());
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[rules]\n").unwrap();

        let result = write_config(&path, false);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "[rules]\n");
    }

    #[test]
    fn force_overwrites_existing_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[rules]\n").unwrap();

        write_config(&path, true).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }
}
