//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the debug toolbar.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ToolbarConfig {
    /// Master switch. When false every request goes straight to the handler.
    pub enabled: bool,

    /// Capture unhandled errors and panics and answer with a traceback page.
    pub intercept_exc: bool,

    /// Replace redirects with a confirmation page that links to the target.
    pub intercept_redirects: bool,

    /// Only show the toolbar on the exception page.
    pub show_on_exc_only: bool,

    /// Only engage for peers listed in `hosts`.
    pub check_host: bool,

    /// Allowed peer addresses. Plain IPs or CIDR networks ("10.0.0.0/8").
    pub hosts: Vec<String>,

    /// Mount point of the toolbar UI. Requests below it are never captured.
    pub path_prefix: String,

    /// Path prefixes that bypass the toolbar entirely.
    pub exclude_prefixes: Vec<String>,

    /// Per-request panels, in registration order.
    pub panels: Vec<String>,

    /// Per-request panels appended after `panels`.
    pub extra_panels: Vec<String>,

    /// Panels rendered on every toolbar page, independent of the request.
    pub global_panels: Vec<String>,

    /// Capacity of the request history.
    pub max_request_history: usize,

    /// Capacity of the exception history.
    pub max_exception_history: usize,

    /// Number of requests listed on the toolbar index page.
    pub max_visible_requests: usize,

    /// Extra inline CSS for the floating toolbar button.
    pub button_style: String,

    /// Outermost stack frames dropped from captured tracebacks.
    pub skip_frames: usize,

    /// Keep std/runtime/framework frames in captured tracebacks.
    pub show_hidden_frames: bool,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intercept_exc: true,
            intercept_redirects: true,
            show_on_exc_only: false,
            check_host: true,
            hosts: vec!["127.0.0.1".to_string(), "::1".to_string()],
            path_prefix: "/_debugtoolbar".to_string(),
            exclude_prefixes: Vec::new(),
            panels: ["headers", "request_vars", "timer", "logging", "traceback"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_panels: Vec::new(),
            global_panels: vec!["settings".to_string(), "versions".to_string()],
            max_request_history: 100,
            max_exception_history: 100,
            max_visible_requests: 10,
            button_style: String::new(),
            skip_frames: 0,
            show_hidden_frames: false,
        }
    }
}

impl ToolbarConfig {
    /// Request panels in the order they wrap the handler.
    pub fn request_panels(&self) -> impl Iterator<Item = &str> {
        self.panels
            .iter()
            .chain(self.extra_panels.iter())
            .map(String::as_str)
    }

    /// `path_prefix` without a trailing slash.
    pub fn root_path(&self) -> &str {
        let trimmed = self.path_prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }

    pub fn toolbar_url(&self, request_id: &str) -> String {
        format!("{}/requests/{}", self.root_path(), request_id)
    }

    pub fn exception_url(&self, traceback_id: &str) -> String {
        format!("{}/exceptions/{}", self.root_path(), traceback_id)
    }

    pub fn css_path(&self) -> String {
        format!("{}/static/toolbar.css", self.root_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: ToolbarConfig = toml::from_str("").unwrap();
        assert_eq!(config, ToolbarConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: ToolbarConfig = toml::from_str(
            r#"
            intercept_redirects = false
            hosts = ["10.0.0.0/8"]
            extra_panels = ["custom"]
            "#,
        )
        .unwrap();

        assert!(!config.intercept_redirects);
        assert!(config.intercept_exc);
        assert_eq!(config.hosts, vec!["10.0.0.0/8"]);
        let panels: Vec<&str> = config.request_panels().collect();
        assert_eq!(panels.last(), Some(&"custom"));
    }

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let config = ToolbarConfig {
            path_prefix: "/_tb/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.toolbar_url("abc"), "/_tb/requests/abc");
        assert_eq!(config.css_path(), "/_tb/static/toolbar.css");
    }
}
