use anyhow::{Context, Result};

use super::BuildPlan;

/// Serialisation format for a rendered plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Toml,
}

pub fn render(plan: &BuildPlan, format: Format) -> Result<String> {
    let mut out = match format {
        Format::Json => {
            serde_json::to_string_pretty(plan).context("Failed to serialize plan as JSON")?
        }
        Format::Toml => toml::to_string_pretty(plan).context("Failed to serialize plan as TOML")?,
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
