//! Crate, dependency and platform versions (global panel).
//!
//! Dependency versions are the requirements declared in the crate manifest.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ToolbarResult;
use crate::panels::{render_panel, Panel, PanelOutput};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "versions";

const MANIFEST: &str = include_str!("../../Cargo.toml");

/// Dependencies listed on the panel.
const KEY_DEPENDENCIES: &[&str] = &["axum", "tower", "tokio", "tera", "tracing"];

#[derive(Debug, Serialize)]
struct VersionsData {
    versions: Vec<(String, String)>,
}

#[derive(Default)]
pub struct VersionsPanel;

impl VersionsPanel {
    pub fn new() -> Self {
        Self
    }

    fn versions(&self) -> Vec<(String, String)> {
        let mut versions = vec![(env!("CARGO_PKG_NAME").to_string(), env!("CARGO_PKG_VERSION").to_string())];
        versions.extend(dependency_versions(MANIFEST));
        versions.push((
            "platform".to_string(),
            format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
        ));
        versions.push((
            "profile".to_string(),
            if cfg!(debug_assertions) { "debug" } else { "release" }.to_string(),
        ));
        versions
    }
}

/// Version requirements of [`KEY_DEPENDENCIES`] found in `manifest`.
fn dependency_versions(manifest: &str) -> Vec<(String, String)> {
    let Ok(manifest) = manifest.parse::<toml::Table>() else {
        return Vec::new();
    };
    let Some(deps) = manifest.get("dependencies").and_then(toml::Value::as_table) else {
        return Vec::new();
    };
    KEY_DEPENDENCIES
        .iter()
        .filter_map(|name| {
            let version = match deps.get(*name)? {
                toml::Value::String(version) => version.clone(),
                toml::Value::Table(table) => table.get("version")?.as_str()?.to_string(),
                _ => return None,
            };
            Some((name.to_string(), version))
        })
        .collect()
}

#[async_trait]
impl Panel for VersionsPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Versions"
    }

    fn nav_subtitle(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        render_panel(self, templates, "panels/versions.html", &VersionsData { versions: self.versions() })
    }
}
