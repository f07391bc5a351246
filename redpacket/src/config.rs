//! Engine configuration
//!
//! Every field has a default matching the stock target application, so an
//! empty JSON object is a valid configuration.

use crate::errors::AutomationError;
use crate::gesture::TapDelay;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_TARGET_PACKAGE: &str = "com.tencent.mm";
pub const DEFAULT_NOTIFICATION_MARKER: &str = "[微信红包]";
pub const DEFAULT_COOLDOWN_MS: u64 = 2000;
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Closed interval of screen fractions, e.g. `0.4..=0.6` of the width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `position` lies within the band of a screen dimension `extent`.
    ///
    /// Compared as a fraction so a boundary pixel lands exactly on the bound.
    pub fn contains(&self, position: f64, extent: u32) -> bool {
        if extent == 0 {
            return false;
        }
        let fraction = position / f64::from(extent);
        fraction >= self.min && fraction <= self.max
    }

    fn validate(&self, name: &str) -> Result<(), AutomationError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.min) || !in_unit(self.max) || self.min > self.max {
            return Err(AutomationError::ConfigError(format!(
                "{name} band [{}, {}] must be an ordered range within [0, 1]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Tuning for the tree searches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Class-name fragments identifying the popup's open button
    pub button_class_markers: Vec<String>,
    pub horizontal_band: Band,
    pub vertical_band: Band,
    /// Deepest level visited below the root; host trees are not validated
    pub max_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            button_class_markers: vec!["Button".to_string(), "ImageButton".to_string()],
            horizontal_band: Band::new(0.4, 0.6),
            vertical_band: Band::new(0.5, 0.8),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// How a keyword match is acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickStrategy {
    /// Deferred tap at the center of the nearest clickable ancestor
    #[default]
    Gesture,
    /// Immediate click action on the nearest clickable ancestor
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Package whose events are handled; everything else is dropped
    pub target_package: String,
    /// Substring identifying a reward notification
    pub notification_marker: String,
    /// Chat keywords, highest priority first
    pub keywords: Vec<String>,
    pub search: SearchConfig,
    /// Minimum interval between two actions on the same element
    pub cooldown_ms: u64,
    pub tap_delay: TapDelay,
    pub tap_duration_ms: u64,
    pub click_strategy: ClickStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_package: DEFAULT_TARGET_PACKAGE.to_string(),
            notification_marker: DEFAULT_NOTIFICATION_MARKER.to_string(),
            keywords: vec!["领取红包".to_string(), "微信红包".to_string()],
            search: SearchConfig::default(),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            tap_delay: TapDelay::default(),
            tap_duration_ms: 50,
            click_strategy: ClickStrategy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AutomationError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loading engine config");
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.target_package.trim().is_empty() {
            return Err(AutomationError::ConfigError(
                "target_package must not be empty".to_string(),
            ));
        }
        if self.notification_marker.is_empty() {
            return Err(AutomationError::ConfigError(
                "notification_marker must not be empty".to_string(),
            ));
        }
        if self.keywords.is_empty() || self.keywords.iter().any(|k| k.is_empty()) {
            return Err(AutomationError::ConfigError(
                "keywords must be a non-empty list of non-empty strings".to_string(),
            ));
        }
        if self.search.button_class_markers.is_empty() {
            return Err(AutomationError::ConfigError(
                "search.button_class_markers must not be empty".to_string(),
            ));
        }
        self.search.horizontal_band.validate("horizontal")?;
        self.search.vertical_band.validate("vertical")?;
        self.tap_delay
            .validate()
            .map_err(|e| AutomationError::ConfigError(e.to_string()))?;
        Ok(())
    }
}
