// Unit tests for types module

use super::*;

#[test]
fn test_viewport_size_parse() {
    // Valid formats
    let size = ViewportSize::parse("1920x1080").unwrap();
    assert_eq!(size.width, 1920);
    assert_eq!(size.height, 1080);

    let size = ViewportSize::parse("375x667").unwrap();
    assert_eq!(size.width, 375);
    assert_eq!(size.height, 667);

    // Invalid formats
    assert!(ViewportSize::parse("1920").is_err());
    assert!(ViewportSize::parse("1920x").is_err());
    assert!(ViewportSize::parse("x1080").is_err());
    assert!(ViewportSize::parse("abc x def").is_err());
    assert!(ViewportSize::parse("1920X1080").is_err()); // uppercase X
}

#[test]
fn test_output_format_serialization() {
    assert_eq!(
        serde_json::to_string(&OutputFormat::Markdown).unwrap(),
        "\"markdown\""
    );
    let parsed: OutputFormat = serde_json::from_str("\"json\"").unwrap();
    assert_eq!(parsed, OutputFormat::Json);
}
