//! Launching the host browser.

use {
    chatsync_config::RuneScapeConfig,
    chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig},
    futures::StreamExt,
    tokio::task::JoinHandle,
    tracing::{debug, info},
};

use crate::{
    detect::{Detected, detect_browser, install_instructions},
    error::BrowserError,
};

/// A launched browser and the task pumping its CDP events.
pub struct BrowserInstance {
    pub browser: Browser,
    pub handler: JoinHandle<()>,
}

impl BrowserInstance {
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
    }
}

pub async fn launch_browser(config: &RuneScapeConfig) -> Result<BrowserInstance, BrowserError> {
    let detected = detect_browser(config.chrome_path.as_deref());
    let Some(executable) = detected.path() else {
        return Err(BrowserError::LaunchFailed(format!(
            "Chrome/Chromium not found. {}",
            install_instructions()
        )));
    };
    info!(path = %executable.display(), headless = config.headless, "launching browser");

    let mut builder = CdpBrowserConfig::builder()
        .chrome_executable(executable)
        .request_timeout(config.navigation_timeout());

    // chromiumoxide is headless unless told otherwise.
    if !config.headless {
        builder = builder.with_head();
    }

    // The app frame is read from the top-level page.
    builder = builder
        .arg("--disable-web-security")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox");

    for arg in &config.chrome_args {
        builder = builder.arg(arg);
    }

    let cdp_config = builder.build().map_err(|e| {
        BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
    })?;

    let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(|e| {
        let hint = match detected {
            Detected::Configured(_) => String::new(),
            _ => format!("\n\n{}", install_instructions()),
        };
        BrowserError::LaunchFailed(format!("{e}{hint}"))
    })?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "browser event error");
            }
        }
        debug!("browser event handler exited (connection closed)");
    });

    Ok(BrowserInstance { browser, handler })
}
