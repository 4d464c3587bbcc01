//! Embedded tera templates for every page the toolbar renders.

use tera::{Context, Tera};

use crate::error::ToolbarResult;

pub const REDIRECT_TEMPLATE: &str = "redirect.html";
pub const EXCEPTION_TEMPLATE: &str = "exception.html";
pub const TOOLBAR_TEMPLATE: &str = "toolbar.html";
pub const REQUEST_TEMPLATE: &str = "request.html";
pub const HISTORY_TEMPLATE: &str = "history.html";

pub const TOOLBAR_CSS: &str = include_str!("../../templates/static/toolbar.css");

const SOURCES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    (REDIRECT_TEMPLATE, include_str!("../../templates/redirect.html")),
    (EXCEPTION_TEMPLATE, include_str!("../../templates/exception.html")),
    (TOOLBAR_TEMPLATE, include_str!("../../templates/toolbar.html")),
    (REQUEST_TEMPLATE, include_str!("../../templates/request.html")),
    (HISTORY_TEMPLATE, include_str!("../../templates/history.html")),
    ("panels/headers.html", include_str!("../../templates/panels/headers.html")),
    ("panels/request_vars.html", include_str!("../../templates/panels/request_vars.html")),
    ("panels/timer.html", include_str!("../../templates/panels/timer.html")),
    ("panels/logging.html", include_str!("../../templates/panels/logging.html")),
    ("panels/traceback.html", include_str!("../../templates/panels/traceback.html")),
    ("panels/settings.html", include_str!("../../templates/panels/settings.html")),
    ("panels/versions.html", include_str!("../../templates/panels/versions.html")),
];

/// Compiled templates plus the toolbar mount point.
///
/// Every render gets `root_path` in its context.
pub struct Templates {
    tera: Tera,
    root_path: String,
}

impl Templates {
    pub fn new(root_path: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(SOURCES.iter().copied())?;
        Ok(Self {
            tera,
            root_path: root_path.trim_end_matches('/').to_string(),
        })
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn render(&self, name: &str, context: &Context) -> ToolbarResult<String> {
        let mut context = context.clone();
        context.insert("root_path", &self.root_path);
        Ok(self.tera.render(name, &context)?)
    }
}
