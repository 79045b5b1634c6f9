//! Platform and environment detection.

use std::path::Path;

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}

/// Interpreter conventionally used for a script, judged by its extension.
pub fn interpreter_for(component: &str) -> Option<&'static str> {
    let ext = Path::new(component).extension()?.to_str()?;
    match ext.to_ascii_lowercase().as_str() {
        "py" => Some(if cfg!(windows) { "python" } else { "python3" }),
        "sh" => Some("sh"),
        "rb" => Some("ruby"),
        "js" | "mjs" => Some("node"),
        _ => None,
    }
}
