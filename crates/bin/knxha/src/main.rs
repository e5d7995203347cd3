//! # knxha — KNX project to Home Assistant converter
//!
//! Composition root that wires the adapters together and runs one import.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Construct the archive scanner (adapter) and the import service
//! - Import a `.knxproj` archive, or reclassify a saved snapshot
//! - Write the Home Assistant YAML, the catalog YAML, the parse report and
//!   optionally a snapshot to the output directory
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use knxha_adapter_knxproj::KnxprojSource;
use knxha_app::services::ImportService;
use knxha_domain::catalog::Catalog;
use knxha_domain::entity::HaEntities;
use knxha_domain::progress::ProgressEvent;
use knxha_domain::snapshot::{ClassifyOptions, Snapshot};

use crate::config::Config;

const ENTITIES_FILE: &str = "knx.yaml";
const CATALOG_FILE: &str = "catalog.yaml";
const REPORT_FILE: &str = "report.json";

/// Convert a KNX project archive into a Home Assistant KNX configuration.
#[derive(Parser, Debug)]
#[command(name = "knxha")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The `.knxproj` archive to import.
    #[arg(required_unless_present = "snapshot_in")]
    archive: Option<PathBuf>,

    /// Configuration file (defaults to `knxha.toml` when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory, overriding the configuration.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Drop entities named `reserve`.
    #[arg(long)]
    drop_reserve: bool,

    /// Reclassify a saved snapshot instead of scanning an archive.
    #[arg(long, conflicts_with = "archive")]
    snapshot_in: Option<PathBuf>,

    /// Save the imported catalog as a snapshot.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn init_logging(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("knxha=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn log_progress(event: ProgressEvent) {
    tracing::debug!(
        phase = ?event.phase,
        percent = event.percent,
        file = event.filename.as_deref().unwrap_or_default(),
        "import progress"
    );
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = content.len(), "output written");
    Ok(())
}

fn write_outputs(dir: &Path, catalog: &Catalog, entities: &HaEntities) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write(dir, ENTITIES_FILE, &knxha_adapter_yaml::render_entities(entities)?)?;
    write(dir, CATALOG_FILE, &knxha_adapter_yaml::render_catalog(catalog)?)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.out_dir {
        config.output.dir = dir;
    }
    init_logging(&config.logging.filter);

    let options = ClassifyOptions {
        drop_reserve: config.classify.drop_reserve || cli.drop_reserve,
    };
    let service = ImportService::new(KnxprojSource::new(config.scanner));
    let out_dir = config.output.dir;

    let snapshot = if let Some(path) = cli.snapshot_in {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let mut snapshot = Snapshot::from_json(&raw)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
        snapshot.options.drop_reserve |= options.drop_reserve;
        let entities = service.classify_snapshot(&snapshot);
        write_outputs(&out_dir, &snapshot.catalog, &entities)?;
        snapshot
    } else {
        let path = cli
            .archive
            .context("an archive path or --snapshot-in is required")?;
        let bytes =
            std::fs::read(&path).with_context(|| format!("reading archive {}", path.display()))?;
        let outcome = service
            .import(&bytes, options, &log_progress)
            .await
            .with_context(|| format!("importing {}", path.display()))?;
        write_outputs(&out_dir, &outcome.catalog, &outcome.entities)?;
        write(&out_dir, REPORT_FILE, &outcome.report.to_json()?)?;
        if outcome.report.has_findings() {
            tracing::warn!(
                missing_dpts = outcome.report.missing_dpts.len(),
                dpt_conflicts = outcome.report.dpt_conflicts.len(),
                unresolved_roles = outcome.report.unresolved_roles.len(),
                "project has findings, see {REPORT_FILE}"
            );
        }
        service.snapshot(outcome.catalog, options)
    };

    if let Some(path) = cli.snapshot_out {
        std::fs::write(&path, snapshot.to_json()?)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_consistent_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_archive_with_flags() {
        let cli = Cli::try_parse_from([
            "knxha",
            "home.knxproj",
            "--out-dir",
            "out",
            "--drop-reserve",
            "--snapshot-out",
            "snap.json",
        ])
        .unwrap();
        assert_eq!(cli.archive, Some(PathBuf::from("home.knxproj")));
        assert_eq!(cli.out_dir, Some(PathBuf::from("out")));
        assert!(cli.drop_reserve);
        assert_eq!(cli.snapshot_out, Some(PathBuf::from("snap.json")));
    }

    #[test]
    fn should_accept_snapshot_without_archive() {
        let cli = Cli::try_parse_from(["knxha", "--snapshot-in", "snap.json"]).unwrap();
        assert!(cli.archive.is_none());
        assert_eq!(cli.snapshot_in, Some(PathBuf::from("snap.json")));
    }

    #[test]
    fn should_require_archive_or_snapshot() {
        assert!(Cli::try_parse_from(["knxha"]).is_err());
    }

    #[test]
    fn should_reject_archive_together_with_snapshot() {
        assert!(Cli::try_parse_from(["knxha", "home.knxproj", "--snapshot-in", "s.json"]).is_err());
    }
}
