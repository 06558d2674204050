//! Implementation of the rotation command.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::{output, supports_color, CommandOutput};
use crate::domain::models::{Config, RotationOutcome, RunReport};
use crate::infrastructure::aws::AwsConnector;
use crate::infrastructure::credentials::default_credentials_path;
use crate::services::{enumerate_profiles, KeyRotator, RotationSettings};

#[derive(Args, Debug, Clone, Default)]
pub struct RotateArgs {
    /// Comma separated list of profiles to rotate (default: every profile with an access key)
    #[arg(short, long, value_name = "LIST")]
    pub profiles: Option<String>,

    /// When two access keys exist, delete the one the profile is not using
    #[arg(short, long)]
    pub force: bool,

    /// Deactivate the old access key instead of deleting it
    #[arg(long)]
    pub safe: bool,

    /// Perform the key rotation instead of only checking
    #[arg(long)]
    pub apply: bool,

    /// Credentials file to read and update
    #[arg(long, value_name = "PATH")]
    pub credentials_file: Option<PathBuf>,

    /// Region used for provider sessions
    #[arg(long)]
    pub region: Option<String>,
}

impl RotateArgs {
    /// Copy the flags that double as configuration values into `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if let Some(path) = &self.credentials_file {
            config.credentials_file = Some(path.clone());
        }
    }

    pub fn settings(&self, config: &Config) -> RotationSettings {
        RotationSettings {
            force: self.force,
            safe: self.safe,
            apply: self.apply,
            ..RotationSettings::from_config(config)
        }
    }
}

impl CommandOutput for RunReport {
    fn to_human(&self) -> String {
        if self.profiles.is_empty() {
            return "No profiles with access keys found.".to_string();
        }

        let colors = supports_color();
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Profile").add_attribute(Attribute::Bold),
            Cell::new("User").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
            Cell::new("Old key").add_attribute(Attribute::Bold),
            Cell::new("New key").add_attribute(Attribute::Bold),
            Cell::new("Detail").add_attribute(Attribute::Bold),
        ]);

        for profile in &self.profiles {
            let result = Cell::new(profile.outcome.label());
            table.add_row(vec![
                Cell::new(&profile.profile),
                Cell::new(profile.user_name.as_deref().unwrap_or("-")),
                if colors { result.fg(outcome_color(&profile.outcome)) } else { result },
                Cell::new(profile.old_key_id.as_deref().unwrap_or("-")),
                Cell::new(profile.new_key_id.as_deref().unwrap_or("-")),
                Cell::new(profile.outcome.detail().unwrap_or("")),
            ]);
        }

        let mut lines = vec![table.to_string()];
        if self.applied {
            lines.push(format!(
                "{} rotated, {} deactivated, {} degraded, {} skipped, {} failed",
                self.count("rotated"),
                self.count("deactivated"),
                self.count("degraded"),
                self.count("skipped"),
                self.count("failed"),
            ));
        } else {
            lines.push("Dry run: nothing was changed. Rerun with --apply to rotate.".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn outcome_color(outcome: &RotationOutcome) -> Color {
    match outcome {
        RotationOutcome::Rotated | RotationOutcome::Deactivated => Color::Green,
        RotationOutcome::Checked { .. } => Color::Cyan,
        RotationOutcome::Degraded { .. } | RotationOutcome::Skipped { .. } => Color::Yellow,
        RotationOutcome::Failed { .. } => Color::Red,
    }
}

/// Credentials file: configured path, else the SDK default location.
pub fn resolve_credentials_file(config: &Config) -> Result<PathBuf> {
    config
        .credentials_file
        .clone()
        .or_else(default_credentials_path)
        .context("Unable to determine the credentials file location (no home directory)")
}

/// Run the rotation against AWS and print the report.
///
/// `config` must already carry the command-line overrides.
pub async fn execute(args: RotateArgs, config: &Config, json_mode: bool) -> Result<RunReport> {
    let store_path = resolve_credentials_file(config)?;
    let profiles = enumerate_profiles(&store_path, args.profiles.as_deref())
        .context("Unable to locate aws credentials file. Exiting")?;

    let rotator = KeyRotator::new(
        Arc::new(AwsConnector::new(config.region.clone())),
        store_path,
        args.settings(config),
    );

    let report = rotator.rotate_all(&profiles).await;
    output(&report, json_mode);
    Ok(report)
}
