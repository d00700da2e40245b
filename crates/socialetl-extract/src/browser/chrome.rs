use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowserLauncher, BrowserSession, SessionCookie};
use crate::error::ExtractError;

const SCROLL_SCRIPT: &str =
    "(() => { window.scrollTo(0, document.body.scrollHeight); return document.body.scrollHeight; })()";

/// Pause after a scroll so lazy-loaded content can render.
const SETTLE_AFTER_SCROLL: Duration = Duration::from_millis(1500);

/// Launches headless Chrome through `chromiumoxide`.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    user_agent: String,
    step_timeout: Duration,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(user_agent: &str, step_timeout_secs: u64) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            step_timeout: Duration::from_secs(step_timeout_secs),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError> {
        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(1280, 900)
            .build()
            .map_err(|e| ExtractError::BrowserUnavailable(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            ExtractError::BrowserUnavailable(format!(
                "failed to launch browser: {e}. Is Chrome or Chromium installed and in PATH?"
            ))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = step(self.step_timeout, "open tab", browser.new_page("about:blank")).await?;
        step(
            self.step_timeout,
            "set user agent",
            page.set_user_agent(self.user_agent.as_str()),
        )
        .await?;

        tracing::debug!("browser session started");
        Ok(Box::new(ChromeSession {
            browser,
            page,
            handler_task,
            user_agent: self.user_agent.clone(),
            step_timeout: self.step_timeout,
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    user_agent: String,
    step_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn open(&self, url: &str, cookies: &[SessionCookie]) -> Result<(), ExtractError> {
        if !cookies.is_empty() {
            let params = cookies
                .iter()
                .map(|c| {
                    CookieParam::builder()
                        .name(c.name.clone())
                        .value(c.value.clone())
                        .domain(c.domain.clone())
                        .path("/")
                        .secure(true)
                        .build()
                        .map_err(|e| ExtractError::Browser(format!("invalid cookie {}: {e}", c.name)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            step(self.step_timeout, "set cookies", self.page.set_cookies(params)).await?;
        }

        step(self.step_timeout, "navigate", self.page.goto(url)).await?;
        step(
            self.step_timeout,
            "wait for navigation",
            self.page.wait_for_navigation(),
        )
        .await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExtractError> {
        let result = step(self.step_timeout, "evaluate", self.page.evaluate(script)).await?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| ExtractError::Browser(format!("script returned no JSON value: {e}")))
    }

    async fn scroll(&self) -> Result<u64, ExtractError> {
        let height = self.evaluate(SCROLL_SCRIPT).await?;
        tokio::time::sleep(SETTLE_AFTER_SCROLL).await;
        Ok(height.as_u64().unwrap_or_default())
    }

    async fn inspect(
        &self,
        url: &str,
        script: &str,
    ) -> Result<serde_json::Value, ExtractError> {
        let tab = step(self.step_timeout, "open tab", self.browser.new_page("about:blank")).await?;
        let outcome = async {
            step(
                self.step_timeout,
                "set user agent",
                tab.set_user_agent(self.user_agent.as_str()),
            )
            .await?;
            step(self.step_timeout, "navigate", tab.goto(url)).await?;
            step(self.step_timeout, "wait for navigation", tab.wait_for_navigation()).await?;
            let result = step(self.step_timeout, "evaluate", tab.evaluate(script)).await?;
            result
                .into_value::<serde_json::Value>()
                .map_err(|e| ExtractError::Browser(format!("script returned no JSON value: {e}")))
        }
        .await;

        if let Err(e) = tab.close().await {
            tracing::debug!(error = %e, url, "failed to close inspection tab");
        }
        outcome
    }

    async fn close(&mut self) -> Result<(), ExtractError> {
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to close browser: {e}")));
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser process did not exit cleanly");
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}

/// Bound one browser step by `limit`, mapping protocol errors to transient
/// browser errors.
async fn step<T, E, F>(limit: Duration, name: &str, fut: F) -> Result<T, ExtractError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ExtractError::Browser(format!("{name}: {e}"))),
        Err(_) => Err(ExtractError::Timeout {
            step: name.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn step_times_out_into_transient_error() {
        let err = step::<(), String, _>(Duration::from_millis(10), "navigate", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { ref step, .. } if step == "navigate"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn step_maps_protocol_errors() {
        let err = step::<(), _, _>(Duration::from_secs(1), "evaluate", async {
            Err("target closed".to_string())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "browser error: evaluate: target closed");
    }
}
