//! Configuration and installation paths for geomod.
//!
//! User configuration follows the XDG Base Directory layout on every
//! platform. Installed artifacts (plugin manifests, shared data) are looked
//! up relative to `$GEOMOD_HOME` or to the running executable.

use std::path::{Path, PathBuf};

/// Environment variable pointing at the geomod installation prefix.
pub const HOME_ENV: &str = "GEOMOD_HOME";

/// Installation-relative directory holding plugin manifests.
pub const PLUGINS_SUBDIR: &str = "share/geomod/plugins";

/// Get the geomod config directory.
///
/// Returns `$XDG_CONFIG_HOME/geomod` if set, otherwise `~/.config/geomod`.
/// The enabled-plugins registry and manager configuration live here.
///
/// # Examples
///
/// ```
/// use geomod_paths::config_dir;
///
/// let config = config_dir();
/// let enabled = config.join("plugins/enabled.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("geomod")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/geomod")
    } else {
        PathBuf::from(".config/geomod")
    }
}

/// Candidate roots for installation-relative lookups, in priority order.
///
/// `$GEOMOD_HOME` first, then the executable's directory and its parent
/// (covers both `bin/` layouts and running from a build tree).
pub fn install_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(home) = std::env::var(HOME_ENV)
        && !home.is_empty()
    {
        roots.push(PathBuf::from(home));
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        roots.push(exe_dir.to_path_buf());
        if let Some(prefix) = exe_dir.parent() {
            roots.push(prefix.to_path_buf());
        }
    }

    roots
}

/// Find `relative` under the first installation root where it exists as a
/// directory.
pub fn find_in_install_path(relative: impl AsRef<Path>) -> Option<PathBuf> {
    let relative = relative.as_ref();
    install_roots()
        .into_iter()
        .map(|root| root.join(relative))
        .find(|candidate| candidate.is_dir())
}

/// Installation-relative plugin manifest directory, if one exists.
pub fn plugins_dir() -> Option<PathBuf> {
    find_in_install_path(PLUGINS_SUBDIR)
}
