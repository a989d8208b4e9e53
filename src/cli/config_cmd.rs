//! Config subcommand implementation.

use crate::cli::load_settings;
use crate::config::{AppSettings, Paths};
use crate::error::{CliResult, ConfigError};
use crate::output;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Inspect or create the settings file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON
    Show,

    /// Write the default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the settings file location
    Path,
}

impl ConfigCommand {
    /// `init` and `path` never read the settings file.
    pub fn execute(&self, config_path: Option<&Path>) -> CliResult<()> {
        match &self.action {
            ConfigAction::Show => {
                let settings = load_settings(config_path)?;
                let json = serde_json::to_string_pretty(&settings).map_err(ConfigError::from)?;
                println!("{}", json);
            }
            ConfigAction::Init { force } => {
                let path = settings_path(config_path)?;
                if path.exists() && !force {
                    output::print_warning(&format!(
                        "{} already exists, use --force to overwrite",
                        path.display()
                    ));
                    return Ok(());
                }

                AppSettings::default().save_to(&path)?;
                output::print_info(&format!("Wrote default settings to {}", path.display()));
            }
            ConfigAction::Path => {
                println!("{}", settings_path(config_path)?.display());
            }
        }

        Ok(())
    }
}

fn settings_path(explicit: Option<&Path>) -> CliResult<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Paths::resolve()?.settings_file()),
    }
}
