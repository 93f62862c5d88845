//! Where `pifand` looks for its settings when no path is given

use std::path::PathBuf;

/// `<config dir>/pifan/config.toml`
///
/// The per-user config directory from `dirs` (`$XDG_CONFIG_HOME` or
/// `~/.config` on Linux). A daemon running without a home directory ends up
/// under `/etc`.
pub fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/etc"));
    base.join("pifan").join("config.toml")
}
