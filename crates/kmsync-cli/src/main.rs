//! `kmsync`: plan and inspect KOTOR/TSL mod installations, and manage the
//! on-disk resource cache/index.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use kmsync_core::cache::gc::{collect_garbage, enforce_quota};
use kmsync_core::config::{resolve_app_data_root, PlanDocument};
use kmsync_core::context::PlannerContext;
use kmsync_core::model::{InstallPlan, InstallPlanEntry, PlanEntryOutcome};
use kmsync_core::validator::{ValidationOutcome, Validator};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const EXIT_CLEAN: i32 = 0;
const EXIT_ISSUES: i32 = 2;
const EXIT_LOCKED: i32 = 3;
const EXIT_MALFORMED: i32 = 4;

#[derive(Parser)]
#[command(name = "kmsync", version, about = "KOTOR/TSL mod installation planner")]
struct Cli {
    /// Override the app-data root (also settable via KMSYNC_APP_DATA_DIR).
    #[arg(long, global = true)]
    app_data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect and maintain the resource cache/index.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Validate a plan document and print the resulting install plan.
    Plan {
        plan_document: PathBuf,
        #[arg(long)]
        mod_dir: Option<PathBuf>,
        #[arg(long)]
        kotor_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "text")]
        format: PlanFormat,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PlanFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print entry counts and total cached bytes.
    Stats,
    /// Remove cached download-cache entries, optionally scoped to one provider URL prefix.
    Clear {
        #[arg(long)]
        provider: Option<String>,
    },
    /// Run garbage collection over the resource index.
    Gc,
    /// Evict least-recently-verified entries until under `--max-bytes`.
    Quota {
        #[arg(long)]
        max_bytes: u64,
    },
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app_data_root = resolve_app_data_root(cli.app_data_dir.as_deref());

    let exit_code = match run(cli.command, &app_data_root) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            EXIT_MALFORMED
        }
    };
    std::process::exit(exit_code);
}

fn run(command: Command, app_data_root: &std::path::Path) -> anyhow::Result<i32> {
    match command {
        Command::Cache { action } => run_cache(action, app_data_root),
        Command::Plan {
            plan_document,
            mod_dir,
            kotor_dir,
            format,
        } => run_plan(&plan_document, mod_dir, kotor_dir, format, app_data_root),
    }
}

fn run_cache(action: CacheAction, app_data_root: &std::path::Path) -> anyhow::Result<i32> {
    std::fs::create_dir_all(app_data_root).context("creating app-data root")?;
    let download_cache_path = app_data_root.join("download-cache.json");
    let resource_index_path = app_data_root.join("resource-index.json");

    match action {
        CacheAction::Stats => {
            let index = match kmsync_core::cache::ResourceIndex::load(&resource_index_path) {
                Ok(i) => i,
                Err(_) => return Ok(EXIT_LOCKED),
            };
            let cache = match kmsync_core::cache::DownloadCache::load(&download_cache_path) {
                Ok(c) => c,
                Err(_) => return Ok(EXIT_LOCKED),
            };
            println!("resource entries: {}", index.len());
            println!("download entries: {}", cache.provider_entries(None).len());
            println!("total cached bytes: {}", index.total_file_size());
            Ok(EXIT_CLEAN)
        }
        CacheAction::Clear { provider } => {
            let cache = kmsync_core::cache::DownloadCache::load(&download_cache_path)
                .map_err(|_| anyhow::anyhow!("cache is locked by another process"))?;
            let removed = cache.clear(provider.as_deref());
            cache.save()?;
            println!("removed {removed} download-cache entries");
            Ok(EXIT_CLEAN)
        }
        CacheAction::Gc => {
            let index = kmsync_core::cache::ResourceIndex::load(&resource_index_path)
                .map_err(|_| anyhow::anyhow!("resource index is locked by another process"))?;
            let report = collect_garbage(&index, now_millis(), |name| {
                app_data_root.join(name).exists()
            });
            index.save(now_millis())?;
            println!(
                "gc: {} stale deleted, {} never-verified deleted, {} downgraded",
                report.deleted_stale_verified, report.deleted_never_verified, report.downgraded
            );
            Ok(EXIT_CLEAN)
        }
        CacheAction::Quota { max_bytes } => {
            let index = kmsync_core::cache::ResourceIndex::load(&resource_index_path)
                .map_err(|_| anyhow::anyhow!("resource index is locked by another process"))?;
            let report = enforce_quota(&index, max_bytes, |name| {
                let _ = std::fs::remove_file(app_data_root.join(name));
            });
            index.save(now_millis())?;
            println!("quota: evicted {} entries, freed {} bytes", report.evicted, report.freed_bytes);
            Ok(EXIT_CLEAN)
        }
    }
}

fn run_plan(
    plan_document: &std::path::Path,
    mod_dir: Option<PathBuf>,
    kotor_dir: Option<PathBuf>,
    format: PlanFormat,
    app_data_root: &std::path::Path,
) -> anyhow::Result<i32> {
    let mut doc = PlanDocument::load(plan_document).context("loading plan document")?;
    if let Some(dir) = mod_dir {
        doc.mod_archive_dir = dir;
    }
    if let Some(dir) = kotor_dir {
        doc.kotor_install_root = dir;
    }

    let ctx = PlannerContext::from_document(&doc, app_data_root.to_path_buf())
        .map_err(|_| anyhow::anyhow!("resource cache is locked by another process"))?;
    let exec_ctx = ctx.exec_context(now_millis());
    let validator = Validator::new();

    let known_files: std::collections::HashSet<String> = ctx
        .resource_index
        .all_entries()
        .iter()
        .flat_map(|m| m.filenames.iter().cloned())
        .collect();

    let mut plan = InstallPlan::default();
    let mut worst_outcome = PlanEntryOutcome::Clean;

    for component in doc.selected_components() {
        let outcome = validator.validate(component, &doc.mod_archive_dir.to_string_lossy(), &exec_ctx, &known_files);
        let necessity = validator.analyze_download_necessity(component, &known_files);
        let entry_outcome = match &outcome {
            ValidationOutcome::Clean => PlanEntryOutcome::Clean,
            ValidationOutcome::NonCriticalPathMismatch => PlanEntryOutcome::NonCriticalPathMismatch,
            ValidationOutcome::Failed { .. } => PlanEntryOutcome::Failed,
        };
        worst_outcome = more_severe(worst_outcome, entry_outcome);
        plan.entries.push(InstallPlanEntry {
            component_id: component.id,
            component_name: component.name.clone(),
            instructions: component.instructions.clone(),
            needed_urls: necessity.needed_urls,
            outcome: entry_outcome,
        });
    }

    match format {
        PlanFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        PlanFormat::Text => {
            for entry in &plan.entries {
                let label = match entry.outcome {
                    PlanEntryOutcome::Clean => "clean".green(),
                    PlanEntryOutcome::NonCriticalPathMismatch => "mismatch".yellow(),
                    PlanEntryOutcome::Failed => "failed".red(),
                };
                println!("{} [{}] {} instructions, {} url(s) needed",
                    entry.component_name, label, entry.instructions.len(), entry.needed_urls.len());
            }
        }
    }

    Ok(match worst_outcome {
        PlanEntryOutcome::Clean => EXIT_CLEAN,
        _ => EXIT_ISSUES,
    })
}

fn more_severe(a: PlanEntryOutcome, b: PlanEntryOutcome) -> PlanEntryOutcome {
    fn rank(o: PlanEntryOutcome) -> u8 {
        match o {
            PlanEntryOutcome::Clean => 0,
            PlanEntryOutcome::NonCriticalPathMismatch => 1,
            PlanEntryOutcome::Failed => 2,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}
