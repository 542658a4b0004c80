//! Chromium detection and install guidance.

use std::path::{Path, PathBuf};

/// Chromium-based executables that speak CDP, in preference order.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chrome-browser",
    "msedge",
    "microsoft-edge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const MACOS_APP_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const WINDOWS_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

/// Where the browser executable was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected {
    Configured(PathBuf),
    Environment(PathBuf),
    Installed(PathBuf),
    NotFound,
}

impl Detected {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Configured(p) | Self::Environment(p) | Self::Installed(p) => Some(p),
            Self::NotFound => None,
        }
    }
}

/// Locate a Chromium-based browser.
///
/// Checks the configured path, then `CHROME`, then platform install
/// locations, then known names on `PATH`.
pub fn detect_browser(configured: Option<&Path>) -> Detected {
    detect_with(configured, std::env::var_os("CHROME").map(PathBuf::from))
}

fn detect_with(configured: Option<&Path>, env: Option<PathBuf>) -> Detected {
    if let Some(path) = configured
        && path.exists()
    {
        return Detected::Configured(path.to_path_buf());
    }
    if let Some(path) = env
        && path.exists()
    {
        return Detected::Environment(path);
    }

    #[cfg(target_os = "macos")]
    if let Some(p) = MACOS_APP_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Detected::Installed(p);
    }

    #[cfg(target_os = "windows")]
    if let Some(p) = WINDOWS_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Detected::Installed(p);
    }

    CHROMIUM_EXECUTABLES
        .iter()
        .find_map(|name| which::which(name).ok())
        .map_or(Detected::NotFound, Detected::Installed)
}

/// Platform-specific install instructions.
pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask chromium"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:         sudo dnf install chromium\n  \
         Arch:           sudo pacman -S chromium"
    } else {
        "  Download from https://www.chromium.org/getting-involved/download-chromium/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         Or set the path manually:\n  \
         [runescape]\n  \
         chrome_path = \"/path/to/chromium\"\n\n\
         Or set the CHROME environment variable."
    )
}
