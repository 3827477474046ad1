//! Headless Chrome capture backend.
//!
//! Each capture launches its own browser, loads the document from a
//! `file://` URL, waits for the content container, lets fonts and layout
//! settle for a fixed delay, then measures the container and takes a
//! viewport screenshot. The [`Browser`] handle owns the Chrome process and
//! kills it when dropped, so every return path below shuts the browser down.

use super::backend::{CaptureBackend, CaptureError};
use super::geometry::ContentBox;
use super::params::RenderSettings;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Launch flags for headless painting in containers and CI.
static CHROME_ARGS: [&str; 3] = ["--disable-gpu", "--hide-scrollbars", "--disable-dev-shm-usage"];

/// Grace period on top of the render's own waits before Chrome's idle
/// watchdog gives up on the connection.
const IDLE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeBackend;

impl ChromeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for ChromeBackend {
    fn capture(
        &self,
        document: &Path,
        screenshot: &Path,
        settings: &RenderSettings,
    ) -> Result<ContentBox, CaptureError> {
        let url = file_url(document)?;
        let browser = launch(settings)?;
        let tab = browser.new_tab().map_err(browser_err("open tab"))?;

        debug!(%url, "loading card document");
        tab.navigate_to(url.as_str())
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(browser_err("navigate"))?;

        tab.wait_for_element_with_custom_timeout(
            &settings.container_selector,
            settings.element_timeout,
        )
        .map_err(|_| CaptureError::ContainerTimeout {
            selector: settings.container_selector.clone(),
            timeout: settings.element_timeout,
        })?;
        std::thread::sleep(settings.settle_delay);

        let bbox = measure(&tab, &settings.container_selector)?;
        debug!(?bbox, "measured content container");

        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(browser_err("screenshot"))?;
        fs::write(screenshot, png)?;
        Ok(bbox)
    }
}

fn launch(settings: &RenderSettings) -> Result<Browser, CaptureError> {
    let options = LaunchOptions {
        headless: true,
        sandbox: false,
        window_size: Some(settings.viewport),
        path: settings.chrome_path.clone(),
        args: CHROME_ARGS.iter().map(|arg| OsStr::new(*arg)).collect(),
        idle_browser_timeout: settings.element_timeout + settings.settle_delay + IDLE_GRACE,
        ..LaunchOptions::default()
    };
    Browser::new(options).map_err(browser_err("launch"))
}

fn file_url(document: &Path) -> Result<Url, CaptureError> {
    let absolute = fs::canonicalize(document)?;
    Url::from_file_path(&absolute).map_err(|()| {
        CaptureError::Browser(format!("cannot build file URL for {}", absolute.display()))
    })
}

/// Build the measuring script for `selector`. The result comes back as a
/// JSON string so it survives the protocol as a plain value.
fn measure_script(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{
  const el = document.querySelector({quoted});
  if (!el) return null;
  const r = el.getBoundingClientRect();
  return JSON.stringify({{
    left: r.left, top: r.top, width: r.width, height: r.height,
    device_pixel_ratio: window.devicePixelRatio
  }});
}})()"
    )
}

fn measure(tab: &Tab, selector: &str) -> Result<ContentBox, CaptureError> {
    let result = tab
        .evaluate(&measure_script(selector), false)
        .map_err(browser_err("measure"))?;
    let json = result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| CaptureError::Browser(format!("container {selector:?} vanished")))?;
    serde_json::from_str(json).map_err(|e| CaptureError::Browser(format!("bad measurement: {e}")))
}

fn browser_err<E: std::fmt::Display>(step: &'static str) -> impl FnOnce(E) -> CaptureError {
    move |e| CaptureError::Browser(format!("{step}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_script_quotes_selector() {
        let js = measure_script(r#"div[data-x="a"]"#);
        assert!(js.contains(r#"document.querySelector("div[data-x=\"a\"]")"#));
        assert!(js.contains("devicePixelRatio"));
    }

    #[test]
    fn measurement_json_parses() {
        let bbox: ContentBox = serde_json::from_str(
            r#"{"left":660.5,"top":140,"width":600,"height":800,"device_pixel_ratio":1}"#,
        )
        .unwrap();
        assert_eq!(bbox.left, 660.5);
        assert_eq!(bbox.device_pixel_ratio, 1.0);
    }

    #[test]
    fn file_url_is_absolute_and_escaped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let doc = tmp.path().join("新年 card.html");
        fs::write(&doc, "").unwrap();

        let url = file_url(&doc).unwrap();

        assert_eq!(url.scheme(), "file");
        assert!(url.as_str().ends_with("card.html"));
        assert!(!url.as_str().contains(' '));
        assert_eq!(url.to_file_path().unwrap(), fs::canonicalize(&doc).unwrap());
    }

    #[test]
    fn file_url_for_missing_document_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            file_url(&tmp.path().join("nope.html")),
            Err(CaptureError::Io(_))
        ));
    }
}
