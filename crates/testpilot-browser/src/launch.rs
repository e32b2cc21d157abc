//! Local browser launch profiles, tried in order until one starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CHROME_BINARIES: [&str; 4] = [
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
];
const EDGE_BINARIES: [&str; 2] = ["msedge", "microsoft-edge"];
const PLAYWRIGHT_CACHE_DIR: &str = "ms-playwright";

pub const LAUNCH_REMEDIATION: &str =
    "Install Google Chrome or Microsoft Edge, or run `npx playwright install chromium`";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LaunchProfile {
    /// A system Chrome/Chromium install.
    Chrome(PathBuf),
    /// A system Edge install.
    Edge(PathBuf),
    /// Chromium downloaded into the Playwright browser cache.
    BundledChromium(PathBuf),
    /// Let the CDP driver locate an executable itself.
    AutoDetect,
}

impl LaunchProfile {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chrome(_) => "chrome",
            Self::Edge(_) => "msedge",
            Self::BundledChromium(_) => "bundled-chromium",
            Self::AutoDetect => "auto-detect",
        }
    }

    pub fn executable(&self) -> Option<&Path> {
        match self {
            Self::Chrome(path) | Self::Edge(path) | Self::BundledChromium(path) => Some(path),
            Self::AutoDetect => None,
        }
    }
}

/// Profiles in preference order: system channels first, bundled engine next.
/// `AutoDetect` is always last, and is the only profile when nothing is installed.
pub fn launch_profiles() -> Vec<LaunchProfile> {
    let mut profiles = Vec::new();

    if let Some(path) = first_on_path(&CHROME_BINARIES) {
        profiles.push(LaunchProfile::Chrome(path));
    }
    if let Some(path) = first_on_path(&EDGE_BINARIES) {
        profiles.push(LaunchProfile::Edge(path));
    }
    if let Some(path) = find_bundled_chromium() {
        profiles.push(LaunchProfile::BundledChromium(path));
    }
    profiles.push(LaunchProfile::AutoDetect);

    profiles
}

fn first_on_path(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| which::which(name).ok())
}

/// Candidate Playwright browser cache directories for this machine.
pub fn playwright_cache_dirs() -> Vec<PathBuf> {
    cache_dirs_from(
        std::env::var_os("PLAYWRIGHT_BROWSERS_PATH").map(PathBuf::from),
        dirs::cache_dir(),
    )
}

/// `PLAYWRIGHT_BROWSERS_PATH` first, then `ms-playwright` under the OS cache dir.
fn cache_dirs_from(override_dir: Option<PathBuf>, cache_dir: Option<PathBuf>) -> Vec<PathBuf> {
    override_dir
        .filter(|path| !path.as_os_str().is_empty())
        .into_iter()
        .chain(cache_dir.map(|dir| dir.join(PLAYWRIGHT_CACHE_DIR)))
        .collect()
}

pub fn detect_playwright_cache() -> bool {
    playwright_cache_dirs().iter().any(|path| path.exists())
}

/// Newest `chromium-*` build in any Playwright cache that has an executable.
pub fn find_bundled_chromium() -> Option<PathBuf> {
    playwright_cache_dirs()
        .iter()
        .filter_map(|dir| bundled_chromium_in(dir))
        .next()
}

fn bundled_chromium_in(cache_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(cache_dir).ok()?;
    let mut builds: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.starts_with("chromium-") && !name.starts_with("chromium-headless")
                })
        })
        .collect();
    builds.sort();
    builds.reverse();

    builds.into_iter().find_map(|build| {
        chromium_executable_candidates(&build)
            .into_iter()
            .find(|path| path.is_file())
    })
}

fn chromium_executable_candidates(build_dir: &Path) -> Vec<PathBuf> {
    vec![
        build_dir.join("chrome-linux/chrome"),
        build_dir.join("chrome-linux64/chrome"),
        build_dir.join("chrome-mac/Chromium.app/Contents/MacOS/Chromium"),
        build_dir.join("chrome-win/chrome.exe"),
        build_dir.join("chrome-win64/chrome.exe"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn auto_detect_is_always_last() {
        let profiles = launch_profiles();
        assert_eq!(profiles.last(), Some(&LaunchProfile::AutoDetect));
        assert!(profiles.last().unwrap().executable().is_none());
    }

    #[test]
    fn bundled_chromium_picks_newest_build_with_binary() {
        let cache = tempdir().unwrap();
        let old = cache.path().join("chromium-1000/chrome-linux");
        let new = cache.path().join("chromium-1200/chrome-linux");
        let headless = cache.path().join("chromium-headless-shell-1300/chrome-linux");
        for dir in [&old, &new, &headless] {
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(dir.join("chrome"), b"").unwrap();
        }

        let found = bundled_chromium_in(cache.path()).unwrap();
        assert_eq!(found, new.join("chrome"));
    }

    #[test]
    fn cache_override_comes_before_os_cache_dir() {
        let dirs = cache_dirs_from(Some("/opt/pw".into()), Some("/home/u/.cache".into()));
        assert_eq!(
            dirs,
            vec![PathBuf::from("/opt/pw"), PathBuf::from("/home/u/.cache/ms-playwright")]
        );
    }

    #[test]
    fn empty_override_is_ignored() {
        let dirs = cache_dirs_from(Some(PathBuf::new()), Some("/cache".into()));
        assert_eq!(dirs, vec![PathBuf::from("/cache/ms-playwright")]);
        assert!(cache_dirs_from(None, None).is_empty());
    }

    #[test]
    fn bundled_chromium_ignores_empty_cache() {
        let cache = tempdir().unwrap();
        std::fs::create_dir_all(cache.path().join("chromium-1000")).unwrap();
        assert!(bundled_chromium_in(cache.path()).is_none());
    }
}
