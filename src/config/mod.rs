// Configuration management module
// TOML settings for the Ollama backend, retrieval and generation

pub mod interactive;
pub mod settings;


pub use interactive::{init_config, run_interactive_config, show_config};
pub use settings::{Config, ConfigError, GenerationConfig, OllamaConfig, RetrievalConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
