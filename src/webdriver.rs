use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::host::{
    ConsoleCall, PerformanceEntry, RawMutation, RelayHost, RelayPoint, RequestEvent,
};
use crate::monitors::RequestApi;
use crate::monitors::console::format_console_args;
use crate::types::ViewportSize;

/// Page-side capture: wraps console, fetch and XHR, observes mutations and
/// buffered paint/input/layout-shift entries, and queues everything for `pump`
const CAPTURE_SCRIPT: &str = r#"
    (function() {
        if (window.__pagewatch_installed) return;
        window.__pagewatch_installed = true;
        window.__pagewatch_queue = [];
        window.__pagewatch_perf = [];

        function queue(event) {
            window.__pagewatch_queue.push(event);
            // Bound the page-side queue between polls
            if (window.__pagewatch_queue.length > 5000) {
                window.__pagewatch_queue.shift();
            }
        }

        function capture(value) {
            if (value === undefined) return 'undefined';
            if (typeof value === 'function') return '[Function]';
            if (value instanceof Error) return String(value);
            try {
                return JSON.parse(JSON.stringify(value));
            } catch (e) {
                return String(value);
            }
        }

        ['log', 'warn', 'error', 'info', 'debug', 'trace'].forEach(function(level) {
            const original = console[level];
            if (typeof original !== 'function') return;
            console[level] = function(...args) {
                queue({ kind: 'console', level: level, args: args.map(capture) });
                return original.apply(console, args);
            };
        });

        window.addEventListener('error', function(event) {
            queue({ kind: 'console', level: 'error', args: [
                `Uncaught ${event.error || event.message} at ${event.filename}:${event.lineno}:${event.colno}`
            ] });
        });

        window.addEventListener('unhandledrejection', function(event) {
            queue({ kind: 'console', level: 'error', args: [`Unhandled Promise Rejection: ${event.reason}`] });
        });

        let nextKey = 1;
        function request(api, event) {
            event.at = performance.now();
            queue({ kind: 'request', api: api, event: event });
        }

        if (typeof window.fetch === 'function') {
            const originalFetch = window.fetch;
            window.fetch = function(input, init) {
                const key = nextKey++;
                const method = (init && init.method) || (input && input.method) || 'GET';
                const url = typeof input === 'string' ? input : (input && input.url) || String(input);
                request('fetch', { phase: 'start', key: key, method: method, url: url });
                return originalFetch.apply(this, arguments).then(function(response) {
                    request('fetch', {
                        phase: 'end', key: key, status: response.status,
                        statusText: response.statusText,
                        contentType: response.headers.get('content-type')
                    });
                    return response;
                }, function(error) {
                    request('fetch', { phase: 'error', key: key, error: String(error) });
                    throw error;
                });
            };
        }

        if (window.XMLHttpRequest) {
            const proto = XMLHttpRequest.prototype;
            const originalOpen = proto.open;
            const originalSend = proto.send;
            proto.open = function(method, url) {
                this.__pagewatch = { method: String(method || 'GET'), url: String(url) };
                return originalOpen.apply(this, arguments);
            };
            proto.send = function() {
                const xhr = this;
                const info = xhr.__pagewatch || { method: 'GET', url: '' };
                const key = nextKey++;
                request('xhr', { phase: 'start', key: key, method: info.method, url: info.url });
                xhr.addEventListener('loadend', function() {
                    if (xhr.status === 0) {
                        request('xhr', { phase: 'error', key: key, error: 'Network error' });
                    } else {
                        request('xhr', {
                            phase: 'end', key: key, status: xhr.status,
                            statusText: xhr.statusText,
                            contentType: xhr.getResponseHeader('content-type')
                        });
                    }
                });
                return originalSend.apply(this, arguments);
            };
        }

        function describe(node, depth) {
            if (!node || depth > 64) return null;
            return {
                tagName: node.tagName || null,
                nodeName: node.nodeName || null,
                id: typeof node.id === 'string' ? node.id : null,
                className: typeof node.className === 'string' ? node.className : null,
                parentElement: describe(node.parentElement, depth + 1)
            };
        }

        function observeMutations() {
            if (!window.MutationObserver || !document.body) return;
            new MutationObserver(function(records) {
                queue({ kind: 'mutations', records: records.map(function(r) {
                    let newValue = null;
                    if (r.type === 'attributes' && r.target.getAttribute) {
                        newValue = r.target.getAttribute(r.attributeName);
                    } else if (r.type === 'characterData') {
                        newValue = r.target.data;
                    }
                    return {
                        type: r.type,
                        target: describe(r.target, 0),
                        addedNodes: r.addedNodes.length,
                        removedNodes: r.removedNodes.length,
                        attributeName: r.attributeName,
                        oldValue: r.oldValue,
                        newValue: newValue
                    };
                }) });
            }).observe(document.body, {
                childList: true, attributes: true, characterData: true, subtree: true,
                attributeOldValue: true, characterDataOldValue: true
            });
        }

        if (document.body) {
            observeMutations();
        } else {
            document.addEventListener('DOMContentLoaded', observeMutations);
        }

        if (window.PerformanceObserver) {
            ['largest-contentful-paint', 'first-input', 'layout-shift'].forEach(function(type) {
                try {
                    new PerformanceObserver(function(list) {
                        list.getEntries().forEach(function(entry) {
                            window.__pagewatch_perf.push(entry.toJSON());
                        });
                    }).observe({ type: type, buffered: true });
                } catch (e) {
                    // Entry type not supported by this browser
                }
            });
        }
    })();
"#;

const DRAIN_SCRIPT: &str = r#"
    const events = window.__pagewatch_queue || [];
    window.__pagewatch_queue = [];
    const observed = window.__pagewatch_perf || [];
    window.__pagewatch_perf = [];
    const timeline = performance.getEntriesByType('navigation')
        .concat(performance.getEntriesByType('paint'), performance.getEntriesByType('resource'))
        .map(function(entry) { return entry.toJSON(); });
    return {
        installed: !!window.__pagewatch_installed,
        events: events,
        perf: timeline.concat(observed)
    };
"#;

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Default WebDriver endpoint for this browser
    pub fn default_webdriver_url(&self) -> String {
        match self {
            BrowserType::Firefox => "http://localhost:4444".to_string(),
            BrowserType::Chrome => "http://localhost:9515".to_string(),
        }
    }

    fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }
}

/// One drained page-side queue
#[derive(Debug, Default, Deserialize)]
struct PageDrain {
    #[serde(default)]
    installed: bool,
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default)]
    perf: Vec<PerformanceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum PageEvent {
    Console(ConsoleCall),
    Request { api: RequestApi, event: RequestEvent },
    Mutations { records: Vec<RawMutation> },
}

/// Browser page feeding a [`RelayHost`]
///
/// The monitors are wired to `host()`; every `pump()` replays what the page
/// recorded since the previous one.
pub struct Browser {
    client: Client,
    browser_type: BrowserType,
    relay: RelayHost,
}

impl Browser {
    /// Connect to a WebDriver session
    ///
    /// # Arguments
    /// * `browser_type` - Firefox or Chrome
    /// * `webdriver_url` - Endpoint override; the browser's default port otherwise
    /// * `viewport` - Optional viewport dimensions
    /// * `headless` - Whether to run in headless mode
    pub async fn connect(
        browser_type: BrowserType,
        webdriver_url: Option<&str>,
        viewport: Option<ViewportSize>,
        headless: bool,
    ) -> Result<Self> {
        info!("Connecting to {:?} WebDriver", browser_type);

        let webdriver_url = webdriver_url
            .map(str::to_string)
            .unwrap_or_else(|| browser_type.default_webdriver_url());

        if !Self::is_webdriver_running(&webdriver_url).await {
            let driver_name = browser_type.driver_name();
            anyhow::bail!(
                "Cannot connect to {} WebDriver at {}.\n\
                Please ensure {} is running:\n\
                  For Firefox: geckodriver --port 4444\n\
                  For Chrome: chromedriver --port 9515",
                driver_name,
                webdriver_url,
                driver_name
            );
        }

        let mut caps = serde_json::Map::new();

        match &browser_type {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if headless {
                    args.push("--headless".to_string());
                }
                if let Some(vp) = &viewport {
                    args.push(format!("--width={}", vp.width));
                    args.push(format!("--height={}", vp.height));
                }
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                // Chrome refuses to share a profile directory between sessions
                let profile_dir = tempfile::Builder::new()
                    .prefix("pagewatch-chrome-")
                    .tempdir()?;
                #[allow(deprecated)]
                let profile_path = profile_dir.into_path();

                let mut args = vec!["--no-sandbox".to_string()];
                if headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                if let Some(vp) = &viewport {
                    args.push(format!("--window-size={},{}", vp.width, vp.height));
                }
                args.push(format!("--user-data-dir={}", profile_path.display()));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
        }

        debug!("Connecting to WebDriver at {}", webdriver_url);

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .context("Failed to connect to WebDriver")?;

        if let Some(vp) = viewport {
            debug!("Setting viewport to {}x{}", vp.width, vp.height);
            if let Err(e) = client.set_window_size(vp.width, vp.height).await {
                debug!("Note: Could not set window size: {}", e);
            }
        }

        // What the page prints still reaches its own devtools; locally it is traced
        let page_console = RelayPoint::new(Arc::new(|call: &ConsoleCall| {
            debug!(
                target: "pagewatch::page",
                "[{}] {}",
                call.level,
                format_console_args(&call.args)
            );
        }));

        Ok(Browser {
            client,
            browser_type,
            relay: RelayHost::with_console(page_console),
        })
    }

    async fn is_webdriver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url.trim_end_matches('/'));

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    /// The host the monitors should be built over
    pub fn host(&self) -> &RelayHost {
        &self.relay
    }

    /// Navigate and install the capture script on the new document
    pub async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.relay.timeline.reset();
        self.install_capture().await
    }

    pub async fn install_capture(&self) -> Result<()> {
        self.client
            .execute(CAPTURE_SCRIPT, vec![])
            .await
            .context("Failed to install page capture script")?;
        Ok(())
    }

    /// Drain the page queue into the relay host; returns the number of events
    pub async fn pump(&self) -> Result<usize> {
        let raw = self
            .client
            .execute(DRAIN_SCRIPT, vec![])
            .await
            .context("Failed to read page capture queue")?;
        let drain: PageDrain =
            serde_json::from_value(raw).context("Unexpected page capture payload")?;

        if !drain.installed {
            // The page navigated on its own; its new document has no capture yet
            debug!("Capture script missing, reinstalling");
            self.relay.timeline.reset();
            self.install_capture().await?;
        }

        let count = drain.events.len();
        for raw_event in drain.events {
            match serde_json::from_value::<PageEvent>(raw_event) {
                Ok(event) => self.dispatch(event),
                Err(e) => debug!("Dropping unrecognized page event: {}", e),
            }
        }
        if !drain.perf.is_empty() {
            self.relay.timeline.record(drain.perf);
        }
        Ok(count)
    }

    fn dispatch(&self, event: PageEvent) {
        match event {
            PageEvent::Console(call) => self.relay.console.emit(&call),
            PageEvent::Request { api, event } => match api {
                RequestApi::Xhr => self.relay.xhr.emit(&event),
                RequestApi::Fetch => self.relay.fetch.emit(&event),
            },
            PageEvent::Mutations { records } => self.relay.mutations.deliver(&records),
        }
    }

    pub async fn get_current_url(&self) -> Result<String> {
        let url = self.client.current_url().await?;
        Ok(url.to_string())
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
