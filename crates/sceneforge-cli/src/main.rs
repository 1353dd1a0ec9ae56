//! Sceneforge CLI
//!
//! Thin front end over the conversion core:
//! - resolves which scene directories to process (explicit list or
//!   discovery under the source root)
//! - runs per-scene generation, then the merge and the table writer
//! - prints the run summary: scenes processed, skipped, warnings per scene
//!
//! Exit code 0 when at least one scene converted; non-zero otherwise.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use sceneforge_convert::{
    check_token_disjointness, convert_scene, generate_global_tables, merge_scenes,
    write_scene_tables, write_tables, ConvertOptions, RunSummary,
};
use sceneforge_tokens::TokenRegistry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "sceneforge")]
#[command(
    author,
    version,
    about = "Convert multi-sensor driving captures into the canonical relational schema"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert per-scene captures under a source root into one set of
    /// target tables.
    Convert {
        /// Directory containing `<dataset>_<N>` scene directories
        source_root: PathBuf,

        /// Output directory for the target tables
        #[arg(short, long)]
        out: PathBuf,

        /// Scene numbers to process; discovered from the source root when
        /// omitted
        #[arg(short, long, value_delimiter = ',')]
        scenes: Vec<u32>,

        /// Dataset prefix used for scene directory and table names
        #[arg(long, default_value = "argov2")]
        dataset: String,

        /// Vehicle name recorded in log rows
        #[arg(long, default_value = "car")]
        vehicle: String,

        /// Capture location recorded in log rows
        #[arg(long, default_value = "unknown")]
        location: String,

        /// Reuse a previously written tokens_map.json so a re-run emits
        /// identical tokens
        #[arg(long)]
        tokens_map: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(succeeded) => {
            if succeeded {
                ExitCode::SUCCESS
            } else {
                eprintln!("{}", "no scene converted successfully".red());
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Convert {
            source_root,
            out,
            scenes,
            dataset,
            vehicle,
            location,
            tokens_map,
        } => {
            let options = ConvertOptions {
                dataset,
                vehicle,
                location,
                date_captured: chrono::Utc::now().format("%Y-%m-%d").to_string(),
                ..ConvertOptions::default()
            };

            let mut registry = match tokens_map {
                Some(path) => TokenRegistry::load(&path)
                    .with_context(|| format!("loading token map {}", path.display()))?,
                None => TokenRegistry::new(),
            };

            let scenes = if scenes.is_empty() {
                let discovered = discover_scenes(&source_root, &options.dataset);
                if discovered.is_empty() {
                    anyhow::bail!(
                        "no {}_<N> scene directories under {}",
                        options.dataset,
                        source_root.display()
                    );
                }
                discovered
            } else {
                dedup_scenes(scenes)
            };

            let mut summary = RunSummary::default();
            let mut converted = Vec::new();
            let mut log_tokens = Vec::new();
            for scene in scenes {
                let dir = source_root.join(format!("{}_{}", options.dataset, scene));
                let source = match sceneforge_ingest::load_scene(&dir, scene) {
                    Ok(source) => source,
                    Err(e) => {
                        summary.record_skip(scene, e.to_string());
                        continue;
                    }
                };
                let (tables, report) = convert_scene(&source, &mut registry, &options);
                log_tokens.push(tables.log.token.clone());
                converted.push(tables);
                summary.record_scene(report);
            }

            if summary.any_succeeded() {
                // A failed merge must not discard the per-scene work: each
                // scene's tables and the token map land under the output
                // root before the error propagates.
                if let Err(error) = check_token_disjointness(&converted) {
                    for tables in &converted {
                        let dir = out.join(format!("scene_{}", tables.scene));
                        write_scene_tables(&dir, tables).with_context(|| {
                            format!("preserving scene tables in {}", dir.display())
                        })?;
                    }
                    registry
                        .save(&out.join("tokens_map.json"))
                        .context("preserving the token map")?;
                    eprintln!(
                        "{} per-scene tables preserved under {}",
                        "merge aborted:".red().bold(),
                        out.display()
                    );
                    return Err(error).context("merging scene record sets");
                }
                let merged = merge_scenes(converted).context("merging scene record sets")?;
                let global = generate_global_tables(&mut registry, &options, log_tokens);
                write_tables(&out, &global, &merged, &registry)
                    .with_context(|| format!("writing tables to {}", out.display()))?;
            }

            print_summary(&summary, &out);
            Ok(summary.any_succeeded())
        }
    }
}

/// Convert each requested scene once, keeping first-mention order. A scene
/// listed twice would convert twice and trip the merge collision check.
fn dedup_scenes(scenes: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    scenes.into_iter().filter(|s| seen.insert(*s)).collect()
}

/// Scan the source root for `<dataset>_<N>` directories, ascending by N.
fn discover_scenes(source_root: &Path, dataset: &str) -> Vec<u32> {
    let prefix = format!("{dataset}_");
    let mut scenes: Vec<u32> = WalkDir::new(source_root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|suffix| suffix.parse().ok())
        })
        .collect();
    scenes.sort_unstable();
    scenes.dedup();
    scenes
}

fn print_summary(summary: &RunSummary, out: &Path) {
    println!();
    println!(
        "{} {} scene(s) converted, {} skipped, {} warning(s)",
        "summary:".bold(),
        summary.processed().to_string().green(),
        summary.skipped.len().to_string().yellow(),
        summary.total_warnings()
    );
    for report in &summary.reports {
        if report.warnings.is_empty() {
            println!(
                "  scene {} ({} frames) {}",
                report.scene,
                report.frames,
                "ok".green()
            );
        } else {
            println!(
                "  scene {} ({} frames) {}",
                report.scene,
                report.frames,
                format!("{} warning(s)", report.warnings.len()).yellow()
            );
            for warning in &report.warnings {
                println!("    - {warning}");
            }
        }
    }
    for skipped in &summary.skipped {
        println!(
            "  scene {} {}: {}",
            skipped.scene,
            "skipped".red(),
            skipped.reason
        );
    }
    if summary.any_succeeded() {
        println!("  tables written to {}", out.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_scene_numbers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["argov2_3", "argov2_1", "argov2_10", "notes", "other_2"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("argov2_9"), "a file, not a scene").unwrap();

        assert_eq!(discover_scenes(dir.path(), "argov2"), vec![1, 3, 10]);
        assert_eq!(discover_scenes(dir.path(), "other"), vec![2]);
        assert!(discover_scenes(dir.path(), "missing").is_empty());
    }

    #[test]
    fn explicit_scene_list_converts_each_scene_once() {
        assert_eq!(dedup_scenes(vec![1, 1, 2, 1, 3]), vec![1, 2, 3]);
        assert_eq!(dedup_scenes(vec![3, 1]), vec![3, 1]);
        assert!(dedup_scenes(vec![]).is_empty());
    }
}
