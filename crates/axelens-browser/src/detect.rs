//! Runtime Chrome/Chromium detection.

use std::path::PathBuf;

/// Find an installed Chrome or Chromium binary.
///
/// `AXELENS_CHROME` takes precedence; after that, common installation
/// paths for the current platform are probed in order.
pub fn detect_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AXELENS_CHROME") {
        if !path.is_empty() {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }
    }

    candidate_paths().into_iter().find(|p| p.exists())
}

/// Candidate Chrome/Chromium executable paths for the current platform.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
        paths.push(PathBuf::from(
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ));
        paths.push(PathBuf::from(
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        ));
        paths.push(PathBuf::from(
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ));
        paths.push(PathBuf::from(
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
            paths.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin/google-chrome"));
        paths.push(PathBuf::from("/usr/bin/google-chrome-stable"));
        paths.push(PathBuf::from("/usr/bin/chromium-browser"));
        paths.push(PathBuf::from("/usr/bin/chromium"));
        paths.push(PathBuf::from("/usr/local/bin/google-chrome"));
        paths.push(PathBuf::from("/usr/local/bin/chromium"));
        paths.push(PathBuf::from("/snap/bin/chromium"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(program_files) = std::env::var("ProgramFiles") {
            paths.push(PathBuf::from(format!(
                "{program_files}\\Google\\Chrome\\Application\\chrome.exe"
            )));
            paths.push(PathBuf::from(format!(
                "{program_files}\\Chromium\\Application\\chrome.exe"
            )));
            paths.push(PathBuf::from(format!(
                "{program_files}\\Microsoft\\Edge\\Application\\msedge.exe"
            )));
        }
        if let Ok(program_files_x86) = std::env::var("ProgramFiles(x86)") {
            paths.push(PathBuf::from(format!(
                "{program_files_x86}\\Google\\Chrome\\Application\\chrome.exe"
            )));
        }
        if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(format!(
                "{local_app_data}\\Google\\Chrome\\Application\\chrome.exe"
            )));
        }
    }

    paths
}
