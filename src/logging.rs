use crate::{PreviewError, PreviewInfo};
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const CARD_WIDTH: usize = 72;
const LABEL_WIDTH: usize = 10;
const VALUE_WIDTH: usize = CARD_WIDTH - LABEL_WIDTH - 5;

#[derive(Debug)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: false,
        }
    }
}

/// Cuts `s` to at most `max` display columns, ending in "..." when shortened.
fn truncate_str(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let budget = max.saturating_sub(3);
    let mut width = 0;
    let mut out: String = s
        .chars()
        .take_while(|c| {
            width += c.width().unwrap_or(1);
            width <= budget
        })
        .collect();
    out.push_str("...");
    out
}

fn card(rows: &[(&str, &str)]) -> String {
    let edge = "═".repeat(CARD_WIDTH - 2);
    let mut out = format!("\n╔{edge}╗\n");
    for (label, value) in rows {
        out.push_str(&format!(
            "║ {:<lw$}{:<vw$} ║\n",
            format!("{label}:"),
            truncate_str(value, VALUE_WIDTH),
            lw = LABEL_WIDTH,
            vw = VALUE_WIDTH + 1,
        ));
    }
    out.push_str(&format!("╚{edge}╝"));
    out
}

pub fn log_preview_card(preview: &PreviewInfo, url: &str) {
    let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
    let status = preview.status.to_string();
    let (title, desc, thumb, provider) = (
        na(&preview.title),
        na(&preview.description),
        na(&preview.thumbnail_url),
        na(&preview.provider_name),
    );

    info!(
        "{}",
        card(&[
            ("URL", url),
            ("Title", title.as_str()),
            ("Desc", desc.as_str()),
            ("Thumbnail", thumb.as_str()),
            ("Provider", provider.as_str()),
            ("Status", status.as_str()),
        ])
    );
}

pub fn log_error_card<E: std::error::Error>(url: &str, error: &E) {
    let mut details = error.to_string();
    if let Some(source) = error.source() {
        details = format!("{details} (cause: {source})");
    }
    error!("{}", card(&[("URL", url), ("Error", details.as_str())]));
}

pub fn setup_logging(config: LogConfig) -> Result<(), PreviewError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .pretty();
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            PreviewError::Config(format!(
                "failed to create log directory {}: {e}",
                config.log_dir.display()
            ))
        })?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "link-preview.log");

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| PreviewError::Config(format!("failed to set global subscriber: {e}")))?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(())
}

/// Scoped subscriber for tests and one-off debugging.
pub struct LogLevelGuard {
    _guard: tracing::dispatcher::DefaultGuard,
}

impl LogLevelGuard {
    pub fn set_level(level: &str) -> Self {
        let filter = EnvFilter::new(level);
        let subscriber = tracing_subscriber::registry()
            .with(subscriber_fmt::layer())
            .with(filter);

        LogLevelGuard {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}
