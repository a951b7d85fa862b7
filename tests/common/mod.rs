// Common test utilities and fixtures

use serde_json::{Value, json};
use std::process::Command;

/// A mutation target shaped the way the page bridge serializes elements
#[allow(dead_code)]
pub fn element(tag: &str, id: Option<&str>, class: Option<&str>, parent: Option<Value>) -> Value {
    let mut node = json!({ "tagName": tag });
    if let Some(id) = id {
        node["id"] = json!(id);
    }
    if let Some(class) = class {
        node["className"] = json!(class);
    }
    node["parentElement"] = parent.unwrap_or(Value::Null);
    node
}

/// `BODY > FORM#login-form`
#[allow(dead_code)]
pub fn login_form() -> Value {
    element(
        "FORM",
        Some("login-form"),
        None,
        Some(element("BODY", None, None, None)),
    )
}

/// Run the pagewatch binary with no `PAGEWATCH_*` variables leaking in
///
/// Returns the parsed stdout (or a synthetic error object) and the exit code.
#[allow(dead_code)]
pub fn run_pagewatch(args: &[&str], env: &[(&str, &str)]) -> (Value, i32) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pagewatch"));
    for (key, _) in std::env::vars() {
        if key.starts_with("PAGEWATCH_") {
            command.env_remove(key);
        }
    }
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command
        .args(args)
        .output()
        .expect("Failed to run pagewatch");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let exit_code = output.status.code().unwrap_or(-1);

    let json = serde_json::from_str(&stdout).unwrap_or_else(|_| {
        json!({
            "error": exit_code != 0,
            "message": if stdout.is_empty() { stderr.to_string() } else { stdout.to_string() },
            "exit_code": exit_code
        })
    });
    (json, exit_code)
}
