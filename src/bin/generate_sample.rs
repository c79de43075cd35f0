use std::path::PathBuf;

use anyhow::{Context, Result};
use etalon_drift::synthetic::SyntheticCampaign;

/// Writes a month of synthetic etalon snapshots drifting at 1e-7 per day.
///
/// Usage: `generate_sample [OUT_DIR]` (default `sample_snapshots`).
fn main() -> Result<()> {
    env_logger::init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_snapshots"));

    let campaign = SyntheticCampaign::default();
    let paths = campaign
        .write(&output_dir)
        .with_context(|| format!("writing snapshots to {}", output_dir.display()))?;

    println!(
        "Wrote {} snapshots ({} peaks each, fractional drift {:e}/day) to {}",
        paths.len(),
        campaign.comb.len(),
        campaign.fractional_rate,
        output_dir.display()
    );

    Ok(())
}
