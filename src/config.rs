use anyhow::{Context, Result};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

/// Distance (in the host's pointer units) within which a category anchor
/// becomes the drop target.
pub const DEFAULT_ACTIVATION_RADIUS: f64 = 100.0;

/// How long the undo affordance stays available after a filing.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCategory {
    pub label: String,
    pub color: String,
}

impl SeedCategory {
    fn new(label: &str, color: &str) -> Self {
        Self {
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub activation_radius: f64,
    pub undo_window: Duration,
    /// `None` leaves timeouts to the extraction collaborator.
    pub extraction_timeout: Option<Duration>,
    /// Created for a user that has no categories yet.
    pub seed_categories: Vec<SeedCategory>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activation_radius: DEFAULT_ACTIVATION_RADIUS,
            undo_window: DEFAULT_UNDO_WINDOW,
            extraction_timeout: None,
            seed_categories: vec![
                SeedCategory::new("Business", "#558E00"),
                SeedCategory::new("Personal", "#6b7280"),
            ],
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `RESEET_ACTIVATION_RADIUS`,
    /// `RESEET_UNDO_WINDOW_MS` and `RESEET_EXTRACTION_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RESEET_ACTIVATION_RADIUS") {
            match raw.trim().parse::<f64>() {
                Ok(r) if r.is_finite() && r > 0.0 => config.activation_radius = r,
                _ => warn!("Ignoring RESEET_ACTIVATION_RADIUS={raw}: not a positive number"),
            }
        }
        if let Some(raw) = lookup("RESEET_UNDO_WINDOW_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.undo_window = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring RESEET_UNDO_WINDOW_MS={raw}: not an integer"),
            }
        }
        if let Some(raw) = lookup("RESEET_EXTRACTION_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.extraction_timeout = None,
                Ok(ms) => config.extraction_timeout = Some(Duration::from_millis(ms)),
                Err(_) => warn!("Ignoring RESEET_EXTRACTION_TIMEOUT_MS={raw}: not an integer"),
            }
        }

        config
    }
}

/// Location of the local SQLite mirror, creating the data directory if needed.
pub fn default_database_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "reseet", "Reseet")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("reseet.db"))
}

/// Installs `env_logger` driven by `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}
