use dirs::home_dir;
use std::path::PathBuf;

/// Returns the primary quarry directory, or None if the user's home cannot be resolved.
pub fn try_quarry_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("QUARRY_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".quarry"))
}

/// Returns the quarry home directory (`~/.quarry`), falling back to a
/// relative `.quarry` when no home directory can be determined.
pub fn quarry_home() -> PathBuf {
    try_quarry_home().unwrap_or_else(|| PathBuf::from(".quarry"))
}

/// Cache path: ~/.quarry/cache
pub fn cache_path() -> PathBuf {
    quarry_home().join("cache")
}

/// Extraction target: ~/.quarry/dist
pub fn output_path() -> PathBuf {
    quarry_home().join("dist")
}

/// Config file: `$QUARRY_CONFIG`, else `./quarry.toml`
pub fn config_path() -> PathBuf {
    std::env::var("QUARRY_CONFIG").map_or_else(|_| PathBuf::from("quarry.toml"), PathBuf::from)
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}
