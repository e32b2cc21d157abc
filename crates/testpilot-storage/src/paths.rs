//! Data directory resolution.

use anyhow::Result;
use std::path::PathBuf;

const TESTPILOT_DIR: &str = ".testpilot";
const DB_FILE: &str = "testpilot.db";
const LOG_DIR: &str = "logs";

/// Environment variable to override the data directory.
pub const TESTPILOT_DIR_ENV: &str = "TESTPILOT_DIR";

/// Environment variable to override the database path.
pub const TESTPILOT_DB_PATH_ENV: &str = "TESTPILOT_DB_PATH";

/// Resolve the data directory.
/// Priority: TESTPILOT_DIR env var > ~/.testpilot/
pub fn resolve_testpilot_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(TESTPILOT_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(TESTPILOT_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

pub fn ensure_testpilot_dir() -> Result<PathBuf> {
    let dir = resolve_testpilot_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Database path: TESTPILOT_DB_PATH, else <data dir>/testpilot.db
pub fn database_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(TESTPILOT_DB_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    Ok(ensure_testpilot_dir()?.join(DB_FILE))
}

pub fn ensure_log_dir() -> Result<PathBuf> {
    let dir = ensure_testpilot_dir()?.join(LOG_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
