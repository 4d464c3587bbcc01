//! Process-wide toolbar state.
//!
//! # Responsibilities
//! - Hold the validated configuration, resolved panels and compiled templates
//! - Own the request and exception histories
//!
//! # Design Decisions
//! - Built once at startup and shared by cloning (`Arc` inside)
//! - Configuration problems surface from `build`, never per request

use std::sync::Arc;

use crate::config::{validate_config, ConfigError, ToolbarConfig};
use crate::history::{HistoryStore, RequestRecord};
use crate::http::access::AccessPolicy;
use crate::panels::{LogCollector, Panel, PanelRegistry, PanelSet};
use crate::traceback::{install_panic_hook, Traceback};
use crate::ui::templates::Templates;

/// Shared toolbar state. Cheap to clone.
#[derive(Clone)]
pub struct ToolbarState {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ToolbarConfig>,
    policy: AccessPolicy,
    panels: PanelSet,
    requests: HistoryStore<RequestRecord>,
    exceptions: HistoryStore<Traceback>,
    templates: Templates,
    logs: LogCollector,
}

impl ToolbarState {
    /// State with the built-in panels only.
    pub fn new(config: ToolbarConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ToolbarConfig) -> ToolbarStateBuilder {
        ToolbarStateBuilder {
            config,
            logs: None,
            custom_panels: PanelRegistry::new(),
            custom_names: Vec::new(),
        }
    }

    pub fn config(&self) -> &ToolbarConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.inner.policy
    }

    pub fn panels(&self) -> &PanelSet {
        &self.inner.panels
    }

    pub fn requests(&self) -> &HistoryStore<RequestRecord> {
        &self.inner.requests
    }

    pub fn exceptions(&self) -> &HistoryStore<Traceback> {
        &self.inner.exceptions
    }

    pub fn templates(&self) -> &Templates {
        &self.inner.templates
    }

    /// Collector feeding the logging panel. Install [`LogCollector::layer`]
    /// in the subscriber for it to receive events.
    pub fn log_collector(&self) -> &LogCollector {
        &self.inner.logs
    }
}

impl std::fmt::Debug for ToolbarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolbarState")
            .field("root_path", &self.inner.config.root_path())
            .field("requests", &self.inner.requests.len())
            .field("exceptions", &self.inner.exceptions.len())
            .finish()
    }
}

/// Builder for [`ToolbarState`].
pub struct ToolbarStateBuilder {
    config: ToolbarConfig,
    logs: Option<LogCollector>,
    custom_panels: PanelRegistry,
    custom_names: Vec<String>,
}

impl ToolbarStateBuilder {
    /// Use an existing collector, typically the one installed in the subscriber.
    pub fn log_collector(mut self, collector: LogCollector) -> Self {
        self.logs = Some(collector);
        self
    }

    /// Make a panel available under `name`. A built-in with the same name is replaced.
    pub fn register_panel<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Panel> + Send + Sync + 'static,
    {
        let name = name.into();
        self.custom_names.push(name.clone());
        self.custom_panels.register(name, factory);
        self
    }

    pub fn build(self) -> Result<ToolbarState, ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;

        let config = Arc::new(self.config);
        let logs = self.logs.unwrap_or_default();
        let mut registry = PanelRegistry::with_builtins(config.clone(), logs.clone());
        registry.merge(self.custom_panels);
        let panels = PanelSet::resolve(&registry, &config)?;
        let templates = Templates::new(config.root_path())?;

        install_panic_hook();

        tracing::info!(
            root_path = %config.root_path(),
            panels = panels.request.len(),
            global_panels = panels.global.len(),
            custom_panels = ?self.custom_names,
            "Debug toolbar initialized"
        );

        Ok(ToolbarState {
            inner: Arc::new(Inner {
                policy: AccessPolicy::from_config(&config),
                requests: HistoryStore::new("requests", config.max_request_history),
                exceptions: HistoryStore::new("exceptions", config.max_exception_history),
                config,
                panels,
                templates,
                logs,
            }),
        })
    }
}
