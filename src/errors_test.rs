// Unit tests for error classification

use super::*;

#[test]
fn test_exit_codes() {
    assert_eq!(PagewatchError::InvalidInput("x".into()).exit_code(), 2);
    assert_eq!(PagewatchError::Config("x".into()).exit_code(), 3);
    assert_eq!(PagewatchError::WebDriverFailed("x".into()).exit_code(), 4);
    assert_eq!(PagewatchError::Timeout("x".into()).exit_code(), 5);
    assert_eq!(
        PagewatchError::Other(anyhow::anyhow!("x")).exit_code(),
        1
    );
}

#[test]
fn test_classify_from_anyhow() {
    let err: PagewatchError = anyhow::anyhow!("Invalid URL 'nope': relative URL without a base").into();
    assert_eq!(err.exit_code(), 2);

    let err: PagewatchError =
        anyhow::anyhow!("Invalid configuration: dom_max_changes must be greater than 0").into();
    assert_eq!(err.exit_code(), 3);

    let err: PagewatchError =
        anyhow::anyhow!("Cannot connect to geckodriver WebDriver at http://localhost:4444").into();
    assert_eq!(err.exit_code(), 4);

    let err: PagewatchError = anyhow::anyhow!("page load timed out").into();
    assert_eq!(err.exit_code(), 5);

    let err: PagewatchError = anyhow::anyhow!("something else").into();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_context_chain_is_classified() {
    let err = anyhow::anyhow!("expected value at line 1 column 1")
        .context("Invalid configuration file /tmp/x.json");
    let err: PagewatchError = err.into();
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("expected value"));
}

#[test]
fn test_configuration_in_urls_is_not_a_config_error() {
    let err: PagewatchError =
        anyhow::anyhow!("Failed to navigate to https://host/configuration").into();
    assert_eq!(err.exit_code(), 1);

    let err: PagewatchError = anyhow::anyhow!("No such file or directory")
        .context("Failed to read configuration file /tmp/missing.json")
        .into();
    assert_eq!(err.exit_code(), 3);

    let err: PagewatchError =
        anyhow::anyhow!("Invalid configuration value for PAGEWATCH_POLL_MS: x").into();
    assert_eq!(err.exit_code(), 3);
}
