//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SIO_TTY";

/// Config file name
const CONFIG_FILE_NAME: &str = "sio-tty.toml";

/// Directory under the user config dir
const APP_DIR_NAME: &str = "sio-tty";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SIO_TTY_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SIO_TTY_CONFIG` environment variable (explicit path)
    /// 2. `./sio-tty.toml` (current directory)
    /// 3. `$XDG_CONFIG_HOME/sio-tty/sio-tty.toml` or `~/.config/sio-tty/sio-tty.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if let Err(e) = apply_env_overrides(&mut config) {
            tracing::warn!(error = %e, "ignoring environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(ConfigError::NoPath)?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            self.config = load_from_file(path)?;
            apply_env_overrides(&mut self.config)?;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Get the user config directory (`$XDG_CONFIG_HOME`, else `~/.config`).
fn get_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{ENV_PREFIX}_{key}");
    std::env::var(&var).ok().map(|val| (var, val))
}

fn parse_env<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    match env_var(key) {
        Some((var, val)) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::bad_override(var, format!("Invalid {what}"))),
        None => Ok(None),
    }
}

fn parse_flag(key: &str) -> Option<bool> {
    env_var(key).map(|(_, val)| matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SIO_TTY_<SECTION>_<KEY>`
/// For example:
/// - `SIO_TTY_SERIAL_DEVICE=/dev/ttyUSB0`
/// - `SIO_TTY_SERIAL_BAUD=115200`
/// - `SIO_TTY_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((_, val)) = env_var("SERIAL_DEVICE") {
        config.serial.device = Some(PathBuf::from(val));
    }
    if let Some(baud) = parse_env("SERIAL_BAUD", "baud rate")? {
        config.serial.baud = baud;
    }
    if let Some(bits) = parse_env("SERIAL_DATA_BITS", "data bits")? {
        config.serial.data_bits = bits;
    }
    if let Some((_, val)) = env_var("SERIAL_PARITY") {
        config.serial.parity = val;
    }
    if let Some(bits) = parse_env("SERIAL_STOP_BITS", "stop bits")? {
        config.serial.stop_bits = bits;
    }
    if let Some(ms) = parse_env("SERIAL_TIMEOUT_MS", "timeout")? {
        config.serial.timeout_ms = ms;
    }
    if let Some(on) = parse_flag("SERIAL_XONXOFF") {
        config.serial.xonxoff = on;
    }
    if let Some(on) = parse_flag("SERIAL_RTSCTS") {
        config.serial.rtscts = on;
    }
    if let Some(on) = parse_flag("SERIAL_EXCLUSIVE") {
        config.serial.exclusive = on;
    }

    // RS-485 overrides
    if let Some(on) = parse_flag("RS485_ENABLED") {
        config.rs485.enabled = on;
    }

    // Device identity overrides
    if let Some((_, val)) = env_var("DEVICE_SYSFS_ROOT") {
        config.device.sysfs_root = PathBuf::from(val);
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = match val.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => return Err(ConfigError::bad_override(var, "Expected json, pretty or compact")),
        };
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME))
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SIO_TTY_SERIAL_BAUD", "115200");
        env::set_var("SIO_TTY_SERIAL_DEVICE", "/dev/ttyACM0");
        env::set_var("SIO_TTY_RS485_ENABLED", "yes");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud, 115200);
        assert_eq!(
            loader.config().serial.device.as_deref(),
            Some(Path::new("/dev/ttyACM0"))
        );
        assert!(loader.config().rs485.enabled);

        env::remove_var("SIO_TTY_SERIAL_BAUD");
        env::remove_var("SIO_TTY_SERIAL_DEVICE");
        env::remove_var("SIO_TTY_RS485_ENABLED");
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_reported() {
        env::set_var("SIO_TTY_SERIAL_TIMEOUT_MS", "soon");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::Override { .. }));
        env::remove_var("SIO_TTY_SERIAL_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_save_then_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut loader = ConfigLoader::with_defaults();
        loader.config.serial.baud = 57600;
        loader.config.logging.format = LogFormat::Json;
        loader.save_to(&path).unwrap();

        let loaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loaded.config().serial.baud, 57600);
        assert_eq!(loaded.config().logging.format, LogFormat::Json);
        assert_eq!(loaded.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_explicit_config_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[serial]\nbaud = 19200\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(loader.config().serial.baud, 19200);

        env::remove_var(CONFIG_PATH_ENV);
    }

    #[test]
    #[serial]
    fn test_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[serial\nbaud = 9600\n").unwrap();
        match ConfigLoader::load_from(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected a parse error, got {other:?}"),
        }

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ConfigLoader::load_from(&missing),
            Err(ConfigError::Read { .. })
        ));

        assert!(matches!(
            ConfigLoader::with_defaults().save(),
            Err(ConfigError::NoPath)
        ));
    }
}
