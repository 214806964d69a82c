//! Local Chrome discovery and launch.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::client::CdpClient;
use crate::error::CdpError;

/// Options for launching a local browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Chrome debugging port.
    pub debug_port: u16,
    /// Profile directory for persistent login state.
    pub profile_dir: PathBuf,
    /// Whether to run Chrome in headless mode.
    pub headless: bool,
    /// Explicit binary; discovered when `None`.
    pub executable: Option<PathBuf>,
}

impl LaunchOptions {
    /// Get the CDP endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.debug_port)
    }
}

/// A Chrome process started by us.
pub struct ChromeLauncher {
    child: Child,
    endpoint: String,
}

impl ChromeLauncher {
    /// Find Chrome executable path.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Command-line arguments for a launch.
    pub(crate) fn args(options: &LaunchOptions) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", options.debug_port),
            format!("--user-data-dir={}", options.profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--metrics-recording-only".to_string(),
        ];
        if options.headless {
            args.push("--headless=new".to_string());
        }
        args
    }

    /// Launch Chrome and wait until its DevTools endpoint answers.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, CdpError> {
        let chrome_path = options
            .executable
            .clone()
            .or_else(Self::find_chrome)
            .ok_or_else(|| CdpError::LaunchFailed("Chrome not found".to_string()))?;

        if let Err(e) = std::fs::create_dir_all(&options.profile_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!(
            "Launching {} with profile at {}",
            chrome_path.display(),
            options.profile_dir.display()
        );

        let child = Command::new(&chrome_path)
            .args(Self::args(options))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CdpError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID: {:?}", child.id());

        let endpoint = options.endpoint();
        let launcher = Self { child, endpoint };

        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if CdpClient::probe(&launcher.endpoint).await.is_ok() {
                return Ok(launcher);
            }
        }

        Err(CdpError::LaunchFailed(
            "Chrome failed to start within timeout".to_string(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Kill the browser process.
    pub async fn shutdown(mut self) -> Result<(), CdpError> {
        info!("Shutting down Chrome...");
        self.child
            .kill()
            .await
            .map_err(|e| CdpError::LaunchFailed(format!("kill failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(headless: bool) -> LaunchOptions {
        LaunchOptions {
            debug_port: 9444,
            profile_dir: PathBuf::from("/tmp/storebridge-test-profile"),
            headless,
            executable: None,
        }
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(options(true).endpoint(), "http://127.0.0.1:9444");
    }

    #[test]
    fn test_args_headless() {
        let args = ChromeLauncher::args(&options(true));
        assert!(args.contains(&"--remote-debugging-port=9444".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/storebridge-test-profile".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
    }

    #[test]
    fn test_args_headful() {
        let args = ChromeLauncher::args(&options(false));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let mut opts = options(true);
        opts.executable = Some(PathBuf::from("/nonexistent/chrome-binary"));
        let result = ChromeLauncher::launch(&opts).await;
        assert!(matches!(result, Err(CdpError::LaunchFailed(_))));
    }
}
