use anyhow::{Context, Result};
use std::path::Path;

use crate::model::LocationMetadata;

/// Column order of the location table.
pub const LOCATION_COLUMNS: [&str; 5] = ["site_name", "site_name_owm", "lat", "long", "timezone"];

/// Write `locations` to `path`, replacing whatever was there.
///
/// The header row is always written, even for an empty batch.
pub fn write_locations(path: &Path, locations: &[LocationMetadata]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create location table: {}", path.display()))?;

    writer
        .write_record(LOCATION_COLUMNS)
        .context("Failed to write location table header")?;

    for location in locations {
        writer
            .serialize(location)
            .with_context(|| format!("Failed to write location row for '{}'", location.site_name))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush location table: {}", path.display()))?;

    Ok(())
}
