use std::path::{Path, PathBuf};

/// Application directory (~/.outline-studio)
pub fn app_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".outline-studio")
}

/// config.json inside the application directory
pub fn config_json_path() -> PathBuf {
    app_dir().join("config.json")
}

/// Default location of the key-value store
pub fn default_data_dir() -> PathBuf {
    app_dir().join("data")
}

pub fn ensure_dir(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        assert_eq!(ensure_dir(&nested).unwrap(), nested);
        assert!(nested.is_dir());
        // Existing directories are fine.
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn data_dir_lives_under_app_dir() {
        assert!(default_data_dir().starts_with(app_dir()));
        assert_eq!(config_json_path().file_name().unwrap(), "config.json");
    }
}
