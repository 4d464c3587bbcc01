//! Active toolbar configuration (global panel).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ToolbarConfig;
use crate::error::ToolbarResult;
use crate::panels::{render_panel, Panel, PanelOutput};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "settings";

#[derive(Debug, Serialize)]
struct SettingsData {
    settings: Vec<(String, String)>,
}

pub struct SettingsPanel {
    config: Arc<ToolbarConfig>,
}

impl SettingsPanel {
    pub fn new(config: Arc<ToolbarConfig>) -> Self {
        Self { config }
    }

    fn pairs(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self.config.as_ref()) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| (key, value.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Panel for SettingsPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Settings"
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        render_panel(self, templates, "panels/settings.html", &SettingsData { settings: self.pairs() })
    }
}
