//! Workspace config file sources: config/config.toml and config/{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;

/// Add workspace config files to builder.
/// Precedence: config/config.toml (base), then config/{STRATA_ENV}.toml on
/// top. STRATA_ENV defaults to "development".
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var("STRATA_ENV").unwrap_or_else(|_| "development".to_string());

    let layered = [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ];
    for path in layered {
        if let (true, Some(path_str)) = (path.exists(), path.to_str()) {
            builder = builder.add_source(File::with_name(path_str).required(false));
        }
    }

    Ok(builder)
}
