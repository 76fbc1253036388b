//! # Site Configuration Files
//!
//! The site configuration lives in a TOML file. Every section is optional;
//! omitted settings fall back to their defaults.
//!
//! ```toml
//! [settings]
//! related_entity_field_1 = "rn_related_entity_1"
//!
//! [bundles.company]
//!
//! [bundles.relation_partnership]
//! relation_enabled = true
//!
//! [bundles.relation_partnership.fields.rn_related_entity_1]
//! field_type = "entity_reference"
//! target_type = "node"
//! target_bundles = ["company"]
//! managed = true
//! ```

use relsync_core::{RelsyncError, SiteConfig};
use std::path::Path;

/// Maximum configuration file size (10 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Parse a site configuration from TOML text.
pub fn parse_site_config(text: &str) -> Result<SiteConfig, RelsyncError> {
    toml::from_str(text)
        .map_err(|e| RelsyncError::DeserializationError(format!("Invalid configuration: {}", e)))
}

/// Read a site configuration file that must exist.
pub fn read_site_config(path: &Path) -> Result<SiteConfig, RelsyncError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        RelsyncError::IoError(format!("Cannot read configuration '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(RelsyncError::DeserializationError(format!(
            "Configuration size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CONFIG_FILE_SIZE
        )));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| RelsyncError::IoError(format!("Read configuration: {}", e)))?;
    parse_site_config(&text)
}

/// Load the active site configuration.
///
/// A missing file yields the default configuration: default settings and
/// no bundles or vocabularies.
pub fn load_site_config(path: &Path) -> Result<SiteConfig, RelsyncError> {
    if !path.exists() {
        tracing::info!("No configuration at {:?}, using defaults", path);
        return Ok(SiteConfig::default());
    }
    let config = read_site_config(path)?;
    tracing::debug!(
        bundles = config.bundles.len(),
        vocabularies = config.vocabularies.len(),
        "loaded site configuration"
    );
    Ok(config)
}
