pub mod types;

use anyhow::{Context, Result};
use std::path::Path;
use types::AppConfig;

/// Config files larger than this are refused unread.
const MAX_CONFIG_SIZE: u64 = 1 << 20;

/// Read, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("reading config metadata: {}", path.display()))?
        .len();
    if size > MAX_CONFIG_SIZE {
        anyhow::bail!(
            "config file too large: {} bytes (max {} bytes)",
            size,
            MAX_CONFIG_SIZE
        );
    }
    warn_if_shared(path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("in {}", path.display()))
}

/// Load the config if the file exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        let config = AppConfig::default();
        validate_config(&config)?;
        Ok(config)
    }
}

/// The file may hold the bootstrap administrator password, so say so when
/// other local users can read it.
#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o7777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{:04o}", mode),
                "Config file is readable by group/others, consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("parsing TOML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

/// Check every section and report all problems at once.
fn validate_config(config: &AppConfig) -> Result<()> {
    let mut problems = Vec::new();

    if config.server.listen.trim().is_empty() {
        problems.push("server.listen must not be empty".to_string());
    }
    if config.limits.max_login_attempts == 0 {
        problems.push("limits.max_login_attempts must be >= 1".to_string());
    }
    if config.limits.max_line_length == 0 {
        problems.push("limits.max_line_length must be > 0".to_string());
    }

    let boot = &config.bootstrap;
    if boot.admin_username.trim().is_empty() {
        problems.push("bootstrap.admin_username must not be empty".to_string());
    }
    match (&boot.admin_password, &boot.admin_password_hash) {
        (None, None) => {
            problems.push("bootstrap needs admin_password or admin_password_hash".to_string())
        }
        (_, Some(hash)) if !hash.starts_with("$argon2") => problems
            .push("bootstrap.admin_password_hash must be an Argon2 PHC string".to_string()),
        (Some(_), None) => tracing::warn!(
            user = %boot.admin_username,
            "Bootstrap admin password is configured in plain text; \
             prefer admin_password_hash (see `invterm hash-password`)"
        ),
        _ => {}
    }

    if problems.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("invalid configuration: {}", problems.join("; "))
    }
}
