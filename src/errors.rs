use std::fmt;

/// Custom error type that includes exit codes
#[derive(Debug)]
pub enum PagewatchError {
    /// Bad URL, viewport, or components file (exit code 2)
    InvalidInput(String),
    /// Unreadable or invalid configuration (exit code 3)
    Config(String),
    /// WebDriver connection failed (exit code 4)
    WebDriverFailed(String),
    /// Operation timeout (exit code 5)
    Timeout(String),
    /// Generic error (exit code 1)
    Other(anyhow::Error),
}

impl PagewatchError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PagewatchError::InvalidInput(_) => 2,
            PagewatchError::Config(_) => 3,
            PagewatchError::WebDriverFailed(_) => 4,
            PagewatchError::Timeout(_) => 5,
            PagewatchError::Other(_) => 1,
        }
    }
}

impl fmt::Display for PagewatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagewatchError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PagewatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PagewatchError::WebDriverFailed(msg) => {
                write!(f, "WebDriver connection failed: {}", msg)
            }
            PagewatchError::Timeout(msg) => write!(f, "Operation timed out: {}", msg),
            PagewatchError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PagewatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PagewatchError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PagewatchError {
    fn from(err: anyhow::Error) -> Self {
        // Classify by message; the full chain is kept for display
        let msg = format!("{:#}", err);

        if msg.contains("Invalid URL")
            || msg.contains("Invalid viewport")
            || msg.contains("Invalid width")
            || msg.contains("Invalid height")
            || msg.contains("Invalid components file")
            || msg.contains("Unsupported browser")
        {
            PagewatchError::InvalidInput(msg)
        } else if msg.contains("Invalid configuration") || msg.contains("configuration file") {
            PagewatchError::Config(msg)
        } else if msg.contains("WebDriver")
            || msg.contains("geckodriver")
            || msg.contains("chromedriver")
        {
            PagewatchError::WebDriverFailed(msg)
        } else if msg.contains("timeout") || msg.contains("timed out") {
            PagewatchError::Timeout(msg)
        } else {
            PagewatchError::Other(err)
        }
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
