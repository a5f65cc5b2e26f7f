// Browser page surface driven over the Chrome DevTools Protocol.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton as CdpMouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::config::BrowserConfig;
use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::types::{DisplaySpec, Environment};
use crate::surface::{MouseButton, Observation, Surface};

pub struct BrowserSurface {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    display: DisplaySpec,
}

impl BrowserSurface {
    /// Launches Chromium, opens one page at `start_url`, and sizes its viewport.
    pub async fn launch(cfg: &BrowserConfig, width: u32, height: u32) -> ScreenLoopResult<Self> {
        let mut builder = CdpBrowserConfig::builder()
            .window_size(width, height)
            .args(cfg.args.clone());
        if !cfg.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &cfg.executable {
            builder = builder.chrome_executable(exe);
        }
        let launch_cfg = builder
            .build()
            .map_err(|e| ScreenLoopError::Config(format!("browser config: {e}")))?;

        tracing::info!(headless = cfg.headless, width, height, "launching browser");
        let (browser, mut handler) = Browser::launch(launch_cfg)
            .await
            .map_err(|e| {
                ScreenLoopError::SurfaceUnavailable(format!("browser launch failed: {e}"))
            })?;

        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "CDP handler error; browser considered closed");
                    break;
                }
            }
            closed_flag.store(true, Ordering::SeqCst);
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScreenLoopError::SurfaceUnavailable(format!("cannot open page: {e}")))?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            width as i64,
            height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(|e| cdp_error("set viewport", e))?;

        page.goto(cfg.start_url.clone())
            .await
            .map_err(|e| cdp_error("navigate", e))?;
        tracing::info!(url = %cfg.start_url, "browser ready");

        Ok(Self {
            browser,
            page,
            handler,
            closed,
            display: DisplaySpec { width, height, environment: Environment::Browser },
        })
    }

    fn ensure_open(&self) -> ScreenLoopResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScreenLoopError::SurfaceUnavailable("browser connection closed".into()));
        }
        Ok(())
    }

    async fn mouse_event(
        &self,
        kind: DispatchMouseEventType,
        x: i32,
        y: i32,
        button: Option<CdpMouseButton>,
    ) -> ScreenLoopResult<()> {
        let mut params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x as f64)
            .y(y as f64);
        if let Some(button) = button {
            params = params.button(button).click_count(1);
        }
        let params = params
            .build()
            .map_err(|e| ScreenLoopError::ActionExecution(format!("mouse event: {e}")))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| cdp_error("mouse event", e))?;
        Ok(())
    }

    async fn key_event(
        &self,
        kind: DispatchKeyEventType,
        def: &KeyDefinition,
    ) -> ScreenLoopResult<()> {
        let mut params = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(def.key.clone());
        if let Some(code) = &def.code {
            params = params.code(code.clone());
        }
        if let Some(vk) = def.key_code {
            params = params.windows_virtual_key_code(vk).native_virtual_key_code(vk);
        }
        if kind == DispatchKeyEventType::KeyDown {
            if let Some(text) = &def.text {
                params = params.text(text.clone());
            }
        }
        let params = params
            .build()
            .map_err(|e| ScreenLoopError::ActionExecution(format!("key event: {e}")))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| cdp_error("key event", e))?;
        Ok(())
    }

    async fn tap(&self, def: &KeyDefinition) -> ScreenLoopResult<()> {
        self.key_event(DispatchKeyEventType::KeyDown, def).await?;
        self.key_event(DispatchKeyEventType::KeyUp, def).await
    }
}

#[async_trait]
impl Surface for BrowserSurface {
    fn display(&self) -> DisplaySpec {
        self.display
    }

    async fn click(&mut self, x: i32, y: i32, button: MouseButton) -> ScreenLoopResult<()> {
        self.ensure_open()?;
        let button = match button {
            MouseButton::Left => CdpMouseButton::Left,
            MouseButton::Right => CdpMouseButton::Right,
        };
        self.mouse_event(DispatchMouseEventType::MouseMoved, x, y, None).await?;
        self.mouse_event(DispatchMouseEventType::MousePressed, x, y, Some(button.clone()))
            .await?;
        self.mouse_event(DispatchMouseEventType::MouseReleased, x, y, Some(button))
            .await
    }

    async fn move_and_scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenLoopResult<()> {
        self.ensure_open()?;
        self.mouse_event(DispatchMouseEventType::MouseMoved, x, y, None).await?;
        self.page
            .evaluate(format!("window.scrollBy({dx}, {dy})"))
            .await
            .map_err(|e| cdp_error("scroll", e))?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> ScreenLoopResult<()> {
        self.ensure_open()?;
        self.tap(&key_definition(key)).await
    }

    async fn type_text(&mut self, text: &str) -> ScreenLoopResult<()> {
        self.ensure_open()?;
        for ch in text.chars() {
            self.tap(&KeyDefinition::from_char(ch)).await?;
        }
        Ok(())
    }

    async fn capture_image(&mut self) -> ScreenLoopResult<Observation> {
        self.ensure_open()?;
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| cdp_error("screenshot", e))?;
        Ok(Observation::new(bytes))
    }

    async fn close(&mut self) -> ScreenLoopResult<()> {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(e) = self.browser.close().await {
                tracing::warn!(error = %e, "browser close failed");
            }
            if let Err(e) = self.browser.wait().await {
                tracing::warn!(error = %e, "waiting for browser exit failed");
            }
        }
        self.handler.abort();
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!("browser closed");
        Ok(())
    }
}

/// Connection-level CDP failures mean the browser is gone; the rest are per-call.
fn cdp_error(context: &str, err: CdpError) -> ScreenLoopError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            ScreenLoopError::SurfaceUnavailable(format!("{context}: {err}"))
        }
        other => ScreenLoopError::ActionExecution(format!("{context}: {other}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyDefinition {
    key: String,
    code: Option<String>,
    key_code: Option<i64>,
    text: Option<String>,
}

impl KeyDefinition {
    fn named(key: &str, code: &str, key_code: i64) -> Self {
        Self {
            key: key.into(),
            code: Some(code.into()),
            key_code: Some(key_code),
            text: None,
        }
    }

    fn from_char(ch: char) -> Self {
        let key_code = match ch {
            'a'..='z' => Some(ch.to_ascii_uppercase() as i64),
            'A'..='Z' | '0'..='9' | ' ' => Some(ch as i64),
            '\n' | '\r' => return Self::named("Enter", "Enter", 13).with_text("\r"),
            _ => None,
        };
        let code = match ch {
            'a'..='z' | 'A'..='Z' => Some(format!("Key{}", ch.to_ascii_uppercase())),
            '0'..='9' => Some(format!("Digit{ch}")),
            ' ' => Some("Space".into()),
            _ => None,
        };
        Self {
            key: ch.to_string(),
            code,
            key_code,
            text: Some(ch.to_string()),
        }
    }

    fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Maps a key name to CDP key-event fields. Single characters type themselves;
/// unknown names go through as the DOM `key` value.
fn key_definition(name: &str) -> KeyDefinition {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return KeyDefinition::from_char(ch);
    }
    match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeyDefinition::named("Enter", "Enter", 13).with_text("\r"),
        "tab" => KeyDefinition::named("Tab", "Tab", 9),
        "backspace" => KeyDefinition::named("Backspace", "Backspace", 8),
        "esc" | "escape" => KeyDefinition::named("Escape", "Escape", 27),
        "delete" => KeyDefinition::named("Delete", "Delete", 46),
        "insert" => KeyDefinition::named("Insert", "Insert", 45),
        "home" => KeyDefinition::named("Home", "Home", 36),
        "end" => KeyDefinition::named("End", "End", 35),
        "pageup" => KeyDefinition::named("PageUp", "PageUp", 33),
        "pagedown" => KeyDefinition::named("PageDown", "PageDown", 34),
        "arrowleft" | "left" => KeyDefinition::named("ArrowLeft", "ArrowLeft", 37),
        "arrowup" | "up" => KeyDefinition::named("ArrowUp", "ArrowUp", 38),
        "arrowright" | "right" => KeyDefinition::named("ArrowRight", "ArrowRight", 39),
        "arrowdown" | "down" => KeyDefinition::named("ArrowDown", "ArrowDown", 40),
        "shift" => KeyDefinition::named("Shift", "ShiftLeft", 16),
        "ctrl" | "control" => KeyDefinition::named("Control", "ControlLeft", 17),
        "alt" | "option" => KeyDefinition::named("Alt", "AltLeft", 18),
        "cmd" | "meta" | "super" | "win" => KeyDefinition::named("Meta", "MetaLeft", 91),
        "capslock" => KeyDefinition::named("CapsLock", "CapsLock", 20),
        _ => KeyDefinition {
            key: name.to_string(),
            code: None,
            key_code: None,
            text: None,
        },
    }
}
