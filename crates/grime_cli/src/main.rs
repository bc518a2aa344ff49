//! `grime` command-line entry point.
//!
//! # Responsibility
//! - Collect complete command input and hand it to `grime_core`.
//! - Resolve workspace root, storage root and active file for the core.
//! - Render results and the annotation tree as plain text.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grime_core::{
    init_logging, AnnotationId, AnnotationRecord, AnnotationService, AnnotationTree, AnnotationType,
    ConfigOverrides, CreateAnnotation, GrimeConfig, JsonRecordStore, Navigation, TreeNode,
    WorkspaceContext, WorkspaceError,
};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "grime",
    version,
    about = "Track todo, fixme, chore and note annotations per workspace"
)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    /// Global storage root holding one directory per workspace.
    #[arg(long, global = true, env = "GRIME_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,
    /// TOML config file.
    #[arg(long, global = true, env = "GRIME_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "GRIME_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create storage for the workspace and repair corrupt collections.
    Init,
    /// Record a new annotation.
    Add {
        #[arg(long = "type")]
        kind: AnnotationType,
        #[arg(long)]
        description: String,
        /// File the annotation refers to, inside the workspace.
        #[arg(long)]
        file: Option<PathBuf>,
        /// 1-based line in `--file`.
        #[arg(long, requires = "file", value_parser = clap::value_parser!(u32).range(1..))]
        line: Option<u32>,
    },
    /// Change description and optionally move to another type.
    Edit {
        id: AnnotationId,
        #[arg(long = "type")]
        kind: Option<AnnotationType>,
        #[arg(long)]
        description: String,
    },
    /// Delete an annotation.
    Delete {
        id: AnnotationId,
        /// Collection to delete from; looked up by id when omitted.
        #[arg(long = "type")]
        kind: Option<AnnotationType>,
    },
    /// Print the file location of an annotation.
    Goto {
        id: AnnotationId,
        /// Delete the annotation if its file no longer exists.
        #[arg(long)]
        delete_stale: bool,
    },
    /// Print all annotations grouped by type.
    Tree,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Grime] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = match workspace_root(cli.workspace.as_deref()) {
        Some(root) => root,
        None => {
            eprintln!("[Grime] No Workspace Detected. Initialization Skipped.");
            return Ok(ExitCode::FAILURE);
        }
    };
    let workspace = match WorkspaceContext::resolve(Some(root.as_path())) {
        Ok(workspace) => workspace,
        Err(WorkspaceError::NoWorkspace) => {
            eprintln!("[Grime] No Workspace Detected. Initialization Skipped.");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    let config = GrimeConfig::load(
        cli.config.as_deref(),
        ConfigOverrides {
            storage_root: cli.storage_root,
            log_level: cli.log_level,
            log_dir: None,
        },
    )?;
    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("[Grime] logging disabled: {err}");
    }

    let (store, repairs) = JsonRecordStore::open(&config.storage_root, &workspace)
        .context("failed to prepare workspace storage")?;
    for repair in &repairs {
        eprintln!(
            "[Grime] JSON file {} was not valid. It has been backed up to {} and recreated -> {}",
            repair.file.display(),
            repair.backup.display(),
            repair.detail
        );
    }

    let service = AnnotationService::new(&store, workspace.clone(), Default::default());
    info!(
        "event=command module=cli status=start command={} workspace_hash={}",
        command_name(&cli.command),
        workspace.workspace_hash()
    );

    match cli.command {
        Command::Init => {
            println!(
                "[Grime] Workspace storage ready at {}",
                store.layout().workspace_dir().display()
            );
        }
        Command::Add {
            kind,
            description,
            file,
            line,
        } => {
            let active_file = match file.as_deref() {
                Some(path) => {
                    let relative = relative_file(&workspace, path);
                    if relative.is_none() {
                        eprintln!(
                            "[Grime] {} is outside the workspace; saving without a file",
                            path.display()
                        );
                    }
                    relative
                }
                None => None,
            };
            let request = CreateAnnotation {
                kind,
                description,
                attach_active_file: file.is_some(),
                line,
            };
            let record = service.create(&request, &active_file)?;
            println!("[Grime] {kind} saved successfully. id={}", record.id);
        }
        Command::Edit {
            id,
            kind,
            description,
        } => {
            let record = find_record(&service, id)?;
            let new_type = kind.unwrap_or(record.kind);
            service.edit(&record, new_type, &description)?;
            println!("[Grime] {new_type} was successfully updated.");
        }
        Command::Delete { id, kind } => {
            let kind = match kind {
                Some(kind) => kind,
                None => find_record(&service, id)?.kind,
            };
            service.delete(kind, id)?;
            println!("[Grime] {kind} was deleted successfully.");
        }
        Command::Goto { id, delete_stale } => {
            let record = find_record(&service, id)?;
            match service.navigate(&record) {
                Navigation::NotAssociated => {
                    eprintln!("[Grime] This annotation is not associated with a file");
                }
                Navigation::Stale { path } if delete_stale => {
                    service.delete_stale(&record)?;
                    println!(
                        "[Grime] {} could not be found; stale {} was deleted.",
                        path.display(),
                        record.kind
                    );
                }
                Navigation::Stale { path } => {
                    eprintln!(
                        "[Grime] Associated file {} could not be found. This annotation may be stale; re-run with --delete-stale to remove it.",
                        path.display()
                    );
                    return Ok(ExitCode::FAILURE);
                }
                Navigation::Open(location) => {
                    println!("{}:{}", location.path.display(), location.line_index + 1);
                }
            }
        }
        Command::Tree => {
            let tree = AnnotationTree::new(&store, service.notifier().clone());
            print!("{}", render_tree(&tree)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Add { .. } => "add",
        Command::Edit { .. } => "edit",
        Command::Delete { .. } => "delete",
        Command::Goto { .. } => "goto",
        Command::Tree => "tree",
    }
}

/// Absolute workspace root from the flag or the current directory.
fn workspace_root(flag: Option<&Path>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    match flag {
        Some(path) if path.is_absolute() => Some(path.to_path_buf()),
        Some(path) => cwd.map(|cwd| cwd.join(path)),
        None => cwd,
    }
}

/// Relative `--file` values are taken relative to the workspace root.
fn relative_file(workspace: &WorkspaceContext, path: &Path) -> Option<String> {
    if path.is_absolute() {
        workspace.relativize(path)
    } else {
        workspace.relativize(&workspace.root().join(path))
    }
}

fn find_record(
    service: &AnnotationService<&JsonRecordStore>,
    id: AnnotationId,
) -> Result<AnnotationRecord> {
    match service.find(id)? {
        Some(record) => Ok(record),
        None => bail!("Referenced annotation {id} not found. Nothing was changed."),
    }
}

fn render_tree(tree: &AnnotationTree<&JsonRecordStore>) -> Result<String> {
    let mut out = String::new();
    for group in tree.snapshot()? {
        out.push_str(&format!("{} ({})\n", group.node.label(), group.children.len()));
        for child in &group.children {
            if let TreeNode::Entry {
                label,
                detail,
                record,
                ..
            } = child
            {
                if detail.is_empty() {
                    out.push_str(&format!("  {label}  [{}]\n", record.id));
                } else {
                    out.push_str(&format!("  {label}  {detail}  [{}]\n", record.id));
                }
            }
        }
    }
    Ok(out)
}
