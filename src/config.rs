use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::request::{ContextScope, OutputAction};

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_instructions_folder() -> String {
    "instructions".to_string()
}

fn default_create_note_template() -> String {
    "You are a careful writing assistant. Produce a well-structured note \
     that fulfils the task below, grounded in the provided material."
        .to_string()
}

fn default_in_place_template() -> String {
    "You are a careful writing assistant editing a document in place. \
     Produce text that fulfils the task below."
        .to_string()
}

/// User configuration, loaded once and passed explicitly into the pipeline.
///
/// Nothing in the pipeline reads this from ambient state; PromptBuilder and
/// the transport receive it at construction, which keeps both testable
/// without a config file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom API host. Empty selects the managed provider endpoint.
    #[serde(default)]
    pub api_host: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Meta-prompt preamble for the create-note mode.
    #[serde(default = "default_create_note_template")]
    pub create_note_template: String,
    /// Meta-prompt preamble for the replace/insert modes.
    #[serde(default = "default_in_place_template")]
    pub in_place_template: String,
    #[serde(default)]
    pub default_context_scope: ContextScope,
    #[serde(default)]
    pub default_output_action: OutputAction,
    /// Default folder for generated notes. Empty means "next to the source".
    #[serde(default)]
    pub default_save_location: String,
    #[serde(default = "default_instructions_folder")]
    pub instructions_folder: String,
    #[serde(default)]
    pub use_mock: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: String::new(),
            model: default_model(),
            create_note_template: default_create_note_template(),
            in_place_template: default_in_place_template(),
            default_context_scope: ContextScope::default(),
            default_output_action: OutputAction::default(),
            default_save_location: String::new(),
            instructions_folder: default_instructions_folder(),
            use_mock: false,
        }
    }
}

impl Settings {
    /// Load settings from file, environment variables, or defaults.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override the config file
        if let Ok(api_key) = std::env::var("NOTESMITH_API_KEY") {
            settings.api_key = Some(api_key);
        }

        if let Ok(host) = std::env::var("NOTESMITH_API_HOST") {
            settings.api_host = host;
        }

        if std::env::var("NOTESMITH_USE_MOCK").is_ok() {
            settings.use_mock = true;
        }

        Ok(settings)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(settings)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".notesmith").join("config.toml"))
    }

    /// Set API key and save config
    pub fn set_api_key(&mut self, api_key: String) -> Result<()> {
        self.api_key = Some(api_key);
        self.save()?;
        info!("API key saved to config file");
        Ok(())
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
            let settings = Self::load_from_file()?;
            println!(
                "API Key: {}",
                if settings.api_key.is_some() { "Set" } else { "Not set" }
            );
            println!(
                "API Host: {}",
                if settings.api_host.trim().is_empty() {
                    "managed (default)"
                } else {
                    settings.api_host.trim()
                }
            );
            println!("Model: {}", settings.model);
            println!("Instructions folder: {}", settings.instructions_folder);
            println!("Mock mode: {}", settings.use_mock);
        } else {
            println!("Status: Not found (using defaults)");
        }

        println!("\nTo set API key:");
        println!("  quill --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export NOTESMITH_API_KEY=<your-key>");

        Ok(())
    }
}
