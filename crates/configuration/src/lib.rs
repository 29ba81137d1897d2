use crate::error::ConfigError;
use std::env;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, DatabaseSettings, ListingSettings, LogFormat, LoggingSettings};

/// The file `load_config` reads from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lightbnb.toml";

/// Loads the application configuration from `lightbnb.toml`.
///
/// The file is optional. Values can be overridden with `LIGHTBNB__`-prefixed
/// environment variables (e.g. `LIGHTBNB__DATABASE__HOST`), and a
/// `DATABASE_URL` variable overrides the connection settings entirely.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Same as [`load_config`] but reads the given file.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("LIGHTBNB")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let mut config = builder.try_deserialize::<Config>()?;

    if let Ok(url) = env::var("DATABASE_URL") {
        tracing::debug!("DATABASE_URL is set; it overrides [database] connection fields");
        config.database.url = Some(url);
    }

    config.validate()?;
    Ok(config)
}
