use std::path::{Path, PathBuf};

const APP_DIR: &str = "tripwire";

/// Directories the runner reads settings from and writes logs to.
///
/// On macOS and Linux settings live in `$XDG_CONFIG_HOME/tripwire` and logs
/// in `$XDG_DATA_HOME/tripwire/logs`, with the usual `~/.config` and
/// `~/.local/share` fallbacks. On Windows both live under `%APPDATA%\tripwire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerPaths {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl RunnerPaths {
    /// Resolve from the environment. `None` when no home directory is known.
    pub fn from_env() -> Option<Self> {
        #[cfg(target_os = "windows")]
        {
            let root = std::env::var("APPDATA").ok().map(PathBuf::from)?.join(APP_DIR);
            Some(Self::with_root(&root))
        }

        #[cfg(not(target_os = "windows"))]
        {
            let home = home_dir()?;
            let config = env_dir("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"));
            let data = env_dir("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local/share"));
            Some(Self {
                config_dir: config.join(APP_DIR),
                log_dir: data.join(APP_DIR).join("logs"),
            })
        }
    }

    /// Everything under one directory: `root/engine.toml`, `root/logs/`
    pub fn with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join("logs"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Engine settings used when the command line names none
    pub fn engine_config_path(&self) -> PathBuf {
        self.config_dir.join("engine.toml")
    }

    /// One log file per scenario, named after it
    pub fn scenario_log_path(&self, scenario_name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", log_file_stem(scenario_name)))
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> Option<PathBuf> {
    env_dir("HOME")
}

#[cfg(not(target_os = "windows"))]
fn env_dir(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Lowercase, with every run of other characters collapsed to `-`
fn log_file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    while stem.ends_with('-') {
        stem.pop();
    }

    if stem.is_empty() {
        "scenario".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_layout() {
        let paths = RunnerPaths::with_root(Path::new("/tmp/tw"));
        assert_eq!(paths.engine_config_path(), Path::new("/tmp/tw/engine.toml"));
        assert_eq!(
            paths.scenario_log_path("Region tour"),
            Path::new("/tmp/tw/logs/region-tour.log")
        );
    }

    #[test]
    fn test_log_file_stem() {
        assert_eq!(log_file_stem("Region tour"), "region-tour");
        assert_eq!(log_file_stem("  Theme / switch!  "), "theme-switch");
        assert_eq!(log_file_stem("v2_timers"), "v2-timers");
        assert_eq!(log_file_stem("***"), "scenario");
    }

    #[test]
    fn test_env_layout_names_the_app() {
        if let Some(paths) = RunnerPaths::from_env() {
            assert!(paths.config_dir().ends_with(APP_DIR));
            assert!(paths.log_dir().ends_with("logs"));
        }
    }
}
