use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use pagewatch::{
    Browser, BrowserType, ContextKind, MonitorManager, OutputFormat, SelectedComponent, Settings,
    ViewportSize,
};

pub struct WatchOptions {
    pub url: String,
    pub duration: u64,
    pub context: Vec<ContextKind>,
    pub prompt: Option<String>,
    pub components: Option<PathBuf>,
    pub format: OutputFormat,
    pub browser: Option<String>,
    pub webdriver_url: Option<String>,
    pub poll_ms: Option<u64>,
    pub viewport: Option<String>,
    pub headless: bool,
}

fn load_components(path: &Path) -> Result<Vec<SelectedComponent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Invalid components file {}", path.display()))?;
    SelectedComponent::list_from_json(&raw)
        .with_context(|| format!("Invalid components file {}", path.display()))
}

pub async fn handle_watch(config: Option<PathBuf>, options: WatchOptions) -> Result<()> {
    // Validate everything local before touching the browser
    let url = url::Url::parse(&options.url)
        .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", options.url, e))?;
    let viewport = options
        .viewport
        .as_deref()
        .map(ViewportSize::parse)
        .transpose()?;
    let components = options
        .components
        .as_deref()
        .map(load_components)
        .transpose()?;

    let mut settings = Settings::load(config.as_deref())?;
    if let Some(browser) = options.browser {
        settings.bridge.browser = browser;
    }
    if let Some(webdriver_url) = options.webdriver_url {
        settings.bridge.webdriver_url = Some(webdriver_url);
    }
    if let Some(poll_ms) = options.poll_ms {
        settings.bridge.poll_interval_ms = poll_ms;
    }
    settings.validate()?;
    let browser_type: BrowserType = settings.bridge.browser.parse()?;
    let headless = options.headless && settings.bridge.headless;

    let browser = Browser::connect(
        browser_type,
        settings.bridge.webdriver_url.as_deref(),
        viewport,
        headless,
    )
    .await?;

    let manager = MonitorManager::new(&browser.host().environment(), &settings.monitors);
    if let Some(components) = components {
        manager.set_selected_components(components);
    }

    let outcome = monitor(&browser, &manager, url.as_str(), &settings, options.duration).await;
    manager.stop();
    if let Err(e) = browser.close().await {
        debug!("Browser did not close cleanly: {}", e);
    }
    outcome?;

    match options.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&manager.snapshot())?);
        }
        OutputFormat::Markdown => {
            let output = match &options.prompt {
                Some(prompt) => manager.context_for_prompt(prompt),
                None => {
                    let kinds = if options.context.is_empty() {
                        ContextKind::ALL.to_vec()
                    } else {
                        options.context
                    };
                    kinds
                        .into_iter()
                        .map(|kind| manager.context(kind))
                        .collect::<Vec<_>>()
                        .join("\n\n")
                }
            };
            println!("{}", output);
        }
    }
    Ok(())
}

async fn monitor(
    browser: &Browser,
    manager: &MonitorManager,
    url: &str,
    settings: &Settings,
    duration: u64,
) -> Result<()> {
    manager.start();
    browser.goto(url).await?;

    info!("Monitoring {} for {}s", url, duration);
    let poll = Duration::from_millis(settings.bridge.poll_interval_ms);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);
    let mut total = 0;
    loop {
        total += browser.pump().await?;
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(poll).await;
    }
    debug!("Replayed {} page events", total);
    Ok(())
}
