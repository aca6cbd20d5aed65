//! Where lyricloop keeps its files.
//!
//! Setting `LYRICLOOP_HOME` puts every file in that one directory. Otherwise
//! the config goes under the platform config directory, the database under
//! the local data directory and the log under the cache directory, each in a
//! `lyricloop` subdirectory.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding every location
pub const HOME_ENV: &str = "LYRICLOOP_HOME";

/// Subdirectory created inside each platform directory
pub const APP_DIR_NAME: &str = "lyricloop";

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "lyricloop.db";
pub const LOG_FILE_NAME: &str = "lyricloop.log";

fn resolve(home: Option<OsString>, platform_dir: Option<PathBuf>) -> PathBuf {
    match home.filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home),
        None => platform_dir
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME),
    }
}

fn app_dir(platform_dir: Option<PathBuf>) -> PathBuf {
    resolve(std::env::var_os(HOME_ENV), platform_dir)
}

/// Directory holding `config.toml`
#[must_use]
pub fn config_dir() -> PathBuf {
    app_dir(dirs::config_dir())
}

#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Default database location, used unless `[storage] database_path` is set
#[must_use]
pub fn database_path() -> PathBuf {
    app_dir(dirs::data_local_dir()).join(DATABASE_FILE_NAME)
}

#[must_use]
pub fn log_file_path() -> PathBuf {
    app_dir(dirs::cache_dir()).join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_override_wins() {
        let dir = resolve(
            Some(OsString::from("/srv/lyrics")),
            Some(PathBuf::from("/home/a/.config")),
        );
        assert_eq!(dir, PathBuf::from("/srv/lyrics"));
    }

    #[test]
    fn test_platform_dir_gets_app_subdir() {
        let dir = resolve(None, Some(PathBuf::from("/home/a/.local/share")));
        assert_eq!(dir, PathBuf::from("/home/a/.local/share/lyricloop"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let dir = resolve(Some(OsString::new()), None);
        assert_eq!(dir, PathBuf::from("./lyricloop"));
    }

    #[test]
    fn test_file_names() {
        assert!(config_path().ends_with(CONFIG_FILE_NAME));
        assert!(database_path().ends_with(DATABASE_FILE_NAME));
        assert!(log_file_path().ends_with(LOG_FILE_NAME));
    }
}
