//! Tracing / logging initialisation.

use std::collections::HashMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Override per component: component_name → level
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            // sqlx logs every statement at info
            components: HashMap::from([("sqlx".to_string(), "warn".to_string())]),
            json: false,
        }
    }
}

impl LogConfig {
    /// `LOG_LEVEL` (default `info`), `LOG_COMPONENTS` (`sqlx=debug,reqwest=warn`)
    /// and `LOG_JSON` (`true`/`1` enables JSON).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = var("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.level = level.trim().to_lowercase();
        }
        if let Some(list) = var("LOG_COMPONENTS") {
            for entry in list.split(',') {
                if let Some((component, level)) = entry.split_once('=') {
                    let (component, level) = (component.trim(), level.trim());
                    if !component.is_empty() && !level.is_empty() {
                        config
                            .components
                            .insert(component.to_string(), level.to_lowercase());
                    }
                }
            }
        }
        config.json = var("LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        config
    }

    /// Filter directives, e.g. `"info,sqlx=warn"`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();

        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Initialise tracing once at startup. `RUST_LOG`, when set, overrides the
/// config. Logs go to stderr so command output on stdout stays parseable.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
