use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chatsync_channels::{ChatAdapter, Credentials, Error, OutboundProfile, PollOutcome, Result},
    chatsync_common::Service,
    chatsync_config::RuneScapeConfig,
    chromiumoxide::{
        Page,
        cdp::browser_protocol::{
            input::{DispatchKeyEventParams, DispatchKeyEventType},
            page::CaptureScreenshotFormat,
        },
        page::ScreenshotParams,
    },
    chrono::{DateTime, Utc},
    secrecy::ExposeSecret,
    serde::de::DeserializeOwned,
    tokio::time::Instant,
    tracing::{debug, info, warn},
};

use crate::{
    companion::{self, ChatScan},
    error::BrowserError,
    launch::{BrowserInstance, launch_browser},
};

const APP_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);
const MODAL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const CHAT_TAB_TIMEOUT: Duration = Duration::from_secs(10);
const CHAT_INPUT_TIMEOUT: Duration = Duration::from_secs(10);
/// The chat tab slides in after its section appears.
const TAB_SLIDE_DELAY: Duration = Duration::from_millis(250);
const WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// Game chat through the RuneScape companion web app.
pub struct RuneScapeAdapter {
    config: RuneScapeConfig,
    browser: tokio::sync::Mutex<Option<BrowserInstance>>,
    page: Mutex<Option<Page>>,
    live: AtomicBool,
}

impl RuneScapeAdapter {
    pub fn new(config: RuneScapeConfig) -> Self {
        Self {
            config,
            browser: tokio::sync::Mutex::new(None),
            page: Mutex::new(None),
            live: AtomicBool::new(false),
        }
    }

    fn current_page(&self) -> Option<Page> {
        self.page.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn open_page(&self) -> std::result::Result<Page, BrowserError> {
        let mut browser = self.browser.lock().await;
        let instance = match browser.take() {
            Some(instance) => instance,
            None => launch_browser(&self.config).await?,
        };
        let page = instance.browser.new_page("about:blank").await;
        *browser = Some(instance);
        Ok(page?)
    }

    async fn close_page(&self) {
        let page = self.page.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(page) = page
            && let Err(e) = page.close().await
        {
            debug!(error = %e, "page close failed");
        }
    }

    async fn log_in(&self, page: &Page, username: &str, password: &str) -> Result<()> {
        page.goto(self.config.url.as_str())
            .await
            .map_err(|e| Error::connect_failed(BrowserError::NavigationFailed(e.to_string())))?;
        debug!(url = %self.config.url, "loaded companion page");

        step(wait_for(page, companion::APP_LOADED, false, APP_LOAD_TIMEOUT).await)?;
        step(type_into(page, companion::USERNAME_INPUT, username).await)?;
        step(type_into(page, companion::PASSWORD_INPUT, password).await)?;
        step(click(page, companion::LOGIN_BUTTON).await)?;
        step(wait_for(page, companion::MODAL, false, LOGIN_TIMEOUT).await)?;

        let save_dialog = companion::exists(companion::SAVE_CREDENTIALS_DIALOG);
        let fresh_login: bool = step(eval(page, &save_dialog).await)?;
        if !fresh_login {
            return Err(Error::connect_rejected(
                "could not log in because the account is logged in elsewhere",
            ));
        }
        info!(username, "logged in");

        step(click(page, companion::MODAL_CANCEL).await)?;
        step(wait_for(page, companion::MODAL, true, MODAL_CLOSE_TIMEOUT).await)?;
        step(click(page, companion::CHAT_TAB).await)?;
        step(wait_for(page, companion::CHAT_SECTION, false, CHAT_TAB_TIMEOUT).await)?;
        tokio::time::sleep(TAB_SLIDE_DELAY).await;

        step(click(page, companion::chat_tab(self.config.chat_type)).await)?;
        step(wait_for(page, companion::MESSAGE_INPUT, false, CHAT_INPUT_TIMEOUT).await)?;
        info!(chat = %self.config.chat_type, "in chat tab");
        Ok(())
    }

    fn require_page(&self) -> Result<Page> {
        self.current_page()
            .ok_or_else(|| Error::unavailable("the browser is not ready yet"))
    }
}

/// `"<author>: <text>"`, or the bare text.
pub fn render_line(text: &str, author: Option<&str>) -> String {
    match author {
        Some(author) => format!("{author}: {text}"),
        None => text.to_string(),
    }
}

fn step<T>(result: std::result::Result<T, BrowserError>) -> Result<T> {
    result.map_err(Error::connect_failed)
}

async fn eval<T: DeserializeOwned>(page: &Page, js: &str) -> std::result::Result<T, BrowserError> {
    page.evaluate(js)
        .await
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
        .into_value()
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))
}

async fn wait_for(
    page: &Page,
    selector: &str,
    hidden: bool,
    timeout: Duration,
) -> std::result::Result<(), BrowserError> {
    let check = companion::selector_state(selector, hidden);
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if eval::<bool>(page, &check).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    Err(BrowserError::Timeout(format!(
        "took too long waiting for {selector} to {}",
        if hidden {
            "disappear"
        } else {
            "appear"
        }
    )))
}

async fn click(page: &Page, selector: &str) -> std::result::Result<(), BrowserError> {
    if eval::<bool>(page, &companion::click(selector)).await? {
        Ok(())
    } else {
        Err(BrowserError::ElementNotFound(selector.to_string()))
    }
}

async fn type_into(
    page: &Page,
    selector: &str,
    text: &str,
) -> std::result::Result<(), BrowserError> {
    if !eval::<bool>(page, &companion::focus_input(selector)).await? {
        return Err(BrowserError::ElementNotFound(selector.to_string()));
    }
    for c in text.chars() {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = DispatchKeyEventParams::builder()
                .r#type(kind)
                .text(c.to_string())
                .build()
                .map_err(BrowserError::Cdp)?;
            page.execute(event).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl ChatAdapter for RuneScapeAdapter {
    fn service(&self) -> Service {
        Service::RuneScape
    }

    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        let Credentials::Account { username, password } = credentials else {
            return Err(Error::connect_rejected("RuneScape needs an account login"));
        };
        self.live.store(false, Ordering::SeqCst);
        self.close_page().await;

        let page = self.open_page().await.map_err(Error::connect_failed)?;
        *self.page.lock().unwrap_or_else(|e| e.into_inner()) = Some(page.clone());

        self.log_in(&page, username, password.expose_secret()).await?;
        self.live.store(true, Ordering::SeqCst);
        info!("ready to chat");
        Ok(())
    }

    async fn disconnect(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.close_page().await;
    }

    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn send_message(
        &self,
        text: &str,
        author: Option<&str>,
        _timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let page = self.require_page()?;
        let line = render_line(text, author);
        type_into(&page, companion::MESSAGE_INPUT, &line)
            .await
            .map_err(Error::send)?;
        click(&page, companion::SUBMIT_BUTTON)
            .await
            .map_err(Error::send)
    }

    fn outbound_profile(&self) -> OutboundProfile {
        OutboundProfile {
            max_len: Some(self.config.max_message_len),
            confirm_delivery: true,
        }
    }

    async fn count_sent_messages(&self) -> Result<usize> {
        let page = self.require_page()?;
        eval(&page, &companion::own_message_count())
            .await
            .map_err(Error::transient_read)
    }

    async fn poll_next_message(&self, cursor: i64) -> Result<PollOutcome> {
        let Some(page) = self.current_page() else {
            return Ok(PollOutcome::Disconnected);
        };
        let scan: ChatScan = eval(&page, &companion::scan_messages(cursor))
            .await
            .map_err(Error::transient_read)?;
        let outcome = scan.into_outcome(cursor);
        if outcome == PollOutcome::Disconnected {
            warn!("lost connection to the chat");
            self.live.store(false, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    async fn capture_markup(&self) -> Result<String> {
        let page = self.require_page()?;
        let markup: Option<String> = eval(&page, &companion::frame_markup())
            .await
            .map_err(Error::capture)?;
        markup.ok_or_else(|| Error::capture("the app frame is not loaded"))
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        let page = self.require_page()?;
        page.screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build(),
        )
        .await
        .map_err(|e| Error::capture(BrowserError::ScreenshotFailed(e.to_string())))
    }

    async fn shutdown(&self) {
        self.disconnect().await;
        if let Some(instance) = self.browser.lock().await.take() {
            instance.close().await;
            info!("browser closed");
        }
    }
}
