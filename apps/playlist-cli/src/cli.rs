use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use playlist_core::{
    DisplayEntry, GateResult, GateStatus, NodeProgress, PlaylistEngine, load_catalog,
    load_config, load_snapshot, next_attempt_number, remediation_nodes, save_snapshot,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "playlist", about = "Drive an adaptive learning playlist session")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a new session from a catalog and write its snapshot
    Build {
        /// YAML list of learning units
        #[arg(short, long)]
        catalog: PathBuf,

        /// Adaptive configuration (defaults apply when missing)
        #[arg(long, default_value = "adaptive.yaml")]
        config: PathBuf,

        #[command(flatten)]
        session: SessionArg,
    },

    /// Print the next decision without applying it
    Resolve {
        #[command(flatten)]
        session: SessionArg,
    },

    /// Resolve and apply the next decision
    Next {
        #[command(flatten)]
        session: SessionArg,
    },

    /// Record a gate attempt for a unit
    Gate {
        #[command(flatten)]
        session: SessionArg,

        /// Unit id of the gate
        #[arg(short, long)]
        unit: String,

        /// The attempt passed
        #[arg(long, conflicts_with = "failed", required_unless_present = "failed")]
        passed: bool,

        /// The attempt failed
        #[arg(long)]
        failed: bool,

        /// Score reported by the assessment
        #[arg(long)]
        score: f64,

        /// Nodes the learner did not master (repeatable)
        #[arg(long = "failed-node")]
        failed_nodes: Vec<String>,
    },

    /// Overwrite mastery for a concept node
    Mastery {
        #[command(flatten)]
        session: SessionArg,

        /// Node id
        #[arg(short, long)]
        node: String,

        /// Mastery in [0, 1]
        #[arg(short, long)]
        mastery: f64,

        /// Attempts recorded for the node
        #[arg(short, long, default_value_t = 1)]
        attempts: u32,
    },

    /// Jump to an index, bypassing gates (review or instructor override)
    Goto {
        #[command(flatten)]
        session: SessionArg,

        #[arg(short, long)]
        index: usize,
    },

    /// Learner jump, subject to allowLearnerChoice
    Choose {
        #[command(flatten)]
        session: SessionArg,

        #[arg(short, long)]
        index: usize,
    },

    /// Show the playlist as seen by a learner
    Show {
        #[command(flatten)]
        session: SessionArg,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct SessionArg {
    /// Session snapshot file
    #[arg(short, long, default_value = "session.yaml")]
    pub session: PathBuf,
}

impl Cli {
    /// Directory and name used for the per-session log file.
    pub fn log_context(&self) -> (PathBuf, Option<String>) {
        let path = self.session_path();
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        (root, name)
    }

    fn session_path(&self) -> &Path {
        match &self.command {
            Commands::Build { session, .. }
            | Commands::Resolve { session }
            | Commands::Next { session }
            | Commands::Gate { session, .. }
            | Commands::Mastery { session, .. }
            | Commands::Goto { session, .. }
            | Commands::Choose { session, .. }
            | Commands::Show { session, .. } => &session.session,
        }
    }

    pub fn run(self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        execute(self.command, &mut out)
    }
}

/// Run a command, writing user-facing output to `out`.
fn execute(command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Build {
            catalog,
            config,
            session,
        } => {
            let units = load_catalog(&catalog)
                .with_context(|| format!("failed to load catalog {}", catalog.display()))?;
            let config = load_config(&config)
                .with_context(|| format!("failed to load config {}", config.display()))?;
            let engine = PlaylistEngine::new(&units, config)?;
            save(&engine, &session.session)?;
            info!(entries = engine.session().playlist().len(), "session created");
            print_json(out, &engine.progress())
        }

        Commands::Resolve { session } => {
            let engine = open(&session.session)?;
            print_json(out, &engine.resolve_next())
        }

        Commands::Next { session } => {
            let mut engine = open(&session.session)?;
            let decision = engine.step()?;
            save(&engine, &session.session)?;
            print_json(out, &decision)
        }

        Commands::Gate {
            session,
            unit,
            passed,
            failed,
            score,
            failed_nodes,
        } => {
            if passed == failed {
                bail!("exactly one of --passed or --failed is required");
            }
            let mut engine = open(&session.session)?;
            let attempt_number = next_attempt_number(engine.session(), &unit);
            engine.record_gate_result(GateResult {
                lu_id: unit.clone(),
                passed,
                score,
                attempt_number,
                failed_nodes,
            })?;
            save(&engine, &session.session)?;

            let remediation = remediation_nodes(engine.session(), &unit);
            if !remediation.is_empty() {
                writeln!(out, "remediate: {}", remediation.join(", "))?;
            }
            print_json(out, &engine.resolve_next())
        }

        Commands::Mastery {
            session,
            node,
            mastery,
            attempts,
        } => {
            let mut engine = open(&session.session)?;
            engine.update_node_progress(&node, NodeProgress { mastery, attempts })?;
            save(&engine, &session.session)?;
            print_json(out, &engine.resolve_next())
        }

        Commands::Goto { session, index } => {
            let mut engine = open(&session.session)?;
            engine.go_to_index(index)?;
            save(&engine, &session.session)?;
            print_table(out, &engine.display_entries())
        }

        Commands::Choose { session, index } => {
            let mut engine = open(&session.session)?;
            engine.choose(index)?;
            save(&engine, &session.session)?;
            print_table(out, &engine.display_entries())
        }

        Commands::Show { session, json } => {
            let engine = open(&session.session)?;
            if json {
                print_json(out, &engine.display_entries())
            } else {
                print_table(out, &engine.display_entries())?;
                let progress = engine.progress();
                writeln!(
                    out,
                    "{}/{} done, {} skipped ({:.0}%)",
                    progress.completed, progress.total, progress.skipped, progress.percent
                )?;
                Ok(())
            }
        }
    }
}

fn open(path: &Path) -> Result<PlaylistEngine> {
    let snapshot = load_snapshot(path)
        .with_context(|| format!("failed to load session {}", path.display()))?;
    Ok(PlaylistEngine::from_snapshot(snapshot)?)
}

fn save(engine: &PlaylistEngine, path: &Path) -> Result<()> {
    save_snapshot(path, &engine.snapshot())
        .with_context(|| format!("failed to save session {}", path.display()))
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_table(out: &mut impl Write, entries: &[DisplayEntry]) -> Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        let marker = if entry.is_current { ">" } else { " " };
        let state = if entry.is_skipped {
            "skipped"
        } else if entry.is_completed {
            "done"
        } else {
            ""
        };
        let gate = match entry.gate_status {
            Some(GateStatus::Pending) => "[gate]",
            Some(GateStatus::Passed) => "[gate: passed]",
            Some(GateStatus::Failed) => "[gate: failed]",
            None => "",
        };
        writeln!(
            out,
            "{marker} {index:>3}  {:<32} {state:<8} {gate}",
            entry.title
        )?;
    }
    Ok(())
}
