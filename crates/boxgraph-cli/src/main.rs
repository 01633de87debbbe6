//! Box graph command-line tools.
//!
//! Provides the `boxgraph` binary for working with graph snapshot files:
//! `inspect` prints a summary, `verify` checks structural constraints and
//! index consistency, `dump` prints the JSON form, `preset` exports an audio
//! unit, and `demo` writes a small example project.
//!
//! Exit codes: 0 = success, 1 = graph error, 2 = constraint violations,
//! 3 = I/O error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use boxgraph_core::catalog::{
    audio_bus, audio_file, audio_region, audio_unit, root, step_sequencer, track,
};
use boxgraph_core::{Address, BoxGraph, BoxId, BoxKind, CoreError, GraphConfig};
use boxgraph_editing::{BoxEditing, EditingError, HistoryConfig};
use boxgraph_storage::{graph_digest, load_graph, save_graph, PresetEncoder, StorageError};

/// Box graph inspection and tooling.
#[derive(Parser)]
#[command(name = "boxgraph", about = "Box graph inspection and tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print box counts per kind, edge count and content digest.
    Inspect {
        /// Graph snapshot file.
        file: PathBuf,
    },

    /// Check exclusive/mandatory constraints and pointer index consistency.
    Verify {
        file: PathBuf,
    },

    /// Print the graph as JSON.
    Dump {
        file: PathBuf,

        /// Only dump this box.
        #[arg(long)]
        id: Option<BoxId>,
    },

    /// Export an audio unit and its dependencies as a preset file.
    Preset {
        file: PathBuf,

        /// Audio unit to export.
        #[arg(long)]
        unit: BoxId,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a small example project.
    Demo {
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Inspect { file } => run_inspect(&file),
        Commands::Verify { file } => run_verify(&file),
        Commands::Dump { file, id } => run_dump(&file, id),
        Commands::Preset { file, unit, output } => run_preset(&file, unit, &output),
        Commands::Demo { output } => run_demo(&output),
    };
    process::exit(exit_code);
}

/// Map a storage error to an exit code, printing it.
fn report(err: &StorageError) -> i32 {
    match err {
        StorageError::Io(e) => {
            eprintln!("I/O error: {}", e);
            3
        }
        StorageError::Core(CoreError::StructuralViolation { violations }) => {
            eprintln!("{} violation(s):", violations.len());
            for violation in violations {
                eprintln!("  - {}", violation);
            }
            2
        }
        e => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn load(file: &Path) -> Result<BoxGraph, i32> {
    load_graph(file).map_err(|e| report(&e))
}

fn run_inspect(file: &Path) -> i32 {
    let graph = match load(file) {
        Ok(g) => g,
        Err(code) => return code,
    };
    let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
    for node in graph.boxes() {
        *kinds.entry(node.kind().name()).or_default() += 1;
    }
    let summary = serde_json::json!({
        "boxes": graph.box_count(),
        "edges": graph.edges().len(),
        "kinds": kinds,
        "digest": graph_digest(&graph).to_hex().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    0
}

fn run_verify(file: &Path) -> i32 {
    let graph = match load(file) {
        Ok(g) => g,
        Err(code) => return code,
    };
    if let Err(e) = graph.verify_pointers() {
        eprintln!("Error: {}", e);
        return 1;
    }
    let violations = graph.edges().validate_requirements();
    if graph.has_mandatory_cycle() {
        eprintln!("warning: mandatory pointers form a cycle");
    }
    if !violations.is_empty() {
        return report(&StorageError::Core(CoreError::StructuralViolation { violations }));
    }
    println!("ok: {} boxes, {} edges", graph.box_count(), graph.edges().len());
    0
}

fn run_dump(file: &Path, id: Option<BoxId>) -> i32 {
    let graph = match load(file) {
        Ok(g) => g,
        Err(code) => return code,
    };
    let json = match id {
        Some(id) => match graph.get_box(id) {
            Ok(node) => node.to_json(),
            Err(e) => return report(&e.into()),
        },
        None => graph.to_json(),
    };
    println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    0
}

fn run_preset(file: &Path, unit: BoxId, output: &Path) -> i32 {
    let graph = match load(file) {
        Ok(g) => g,
        Err(code) => return code,
    };
    let bytes = match PresetEncoder::encode(&graph, unit) {
        Ok(bytes) => bytes,
        Err(e) => return report(&e),
    };
    if let Err(e) = std::fs::write(output, &bytes) {
        return report(&e.into());
    }
    println!("wrote {} bytes to {}", bytes.len(), output.display());
    0
}

fn run_demo(output: &Path) -> i32 {
    let mut graph = BoxGraph::with_config(GraphConfig::from_env());
    let mut editing = BoxEditing::with_config(HistoryConfig::from_env());
    if let Err(e) = build_demo(&mut graph, &mut editing) {
        eprintln!("Error: {}", e);
        return 1;
    }
    if let Err(e) = save_graph(output, &graph) {
        return report(&e);
    }
    tracing::info!(steps = editing.history().len(), "demo project written");
    println!("wrote {} boxes to {}", graph.box_count(), output.display());
    0
}

/// Builds a project with one instrument on a master bus, a track with a
/// region, and a step sequencer, as three undoable steps.
fn build_demo(graph: &mut BoxGraph, editing: &mut BoxEditing) -> Result<(), EditingError> {
    let project = BoxId::generate();
    let unit = BoxId::generate();
    editing.modify(graph, |g| {
        g.create_box(BoxKind::Root, project, |b| {
            b.set(&[root::NAME], "Demo");
        })?;
        let bus = g.create_box(BoxKind::AudioBus, BoxId::generate(), |b| {
            b.set(&[audio_bus::LABEL], "Master");
        })?;
        g.create_box(BoxKind::AudioUnit, unit, |b| {
            b.refer(&[audio_unit::HOST], Address::new(project, &[root::AUDIO_UNITS]))
                .refer(&[audio_unit::OUTPUT_BUS], Address::new(bus, &[audio_bus::INPUT]))
                .set(&[audio_unit::LABEL], "Drums");
        })?;
        Ok(())
    })?;

    editing.append(graph, |g| {
        let lane = g.create_box(BoxKind::Track, BoxId::generate(), |b| {
            b.refer(&[track::AUDIO_UNIT], Address::new(unit, &[audio_unit::TRACKS]));
        })?;
        let file = g.create_box(BoxKind::AudioFile, BoxId::generate(), |b| {
            b.set(&[audio_file::FILE_NAME], "loop.wav")
                .set(&[audio_file::END_IN_SECONDS], 4.0f32);
        })?;
        g.create_box(BoxKind::AudioRegion, BoxId::generate(), |b| {
            b.refer(&[audio_region::REGIONS], Address::new(lane, &[track::REGIONS]))
                .refer(&[audio_region::FILE], Address::of_box(file))
                .set(&[audio_region::DURATION], 3840);
        })?;
        Ok(())
    })?;
    editing.mark_described(Some("add loop track"));

    editing.modify(graph, |g| {
        let sequencer = g.create_box(BoxKind::StepSequencer, BoxId::generate(), |b| {
            b.refer(
                &[step_sequencer::HOST],
                Address::new(unit, &[audio_unit::MIDI_EFFECTS]),
            );
        })?;
        for s in (0..step_sequencer::STEP_COUNT).step_by(4) {
            let gate = Address::new(
                sequencer,
                &[
                    step_sequencer::PATTERNS,
                    0,
                    step_sequencer::pattern::STEPS,
                    s,
                    step_sequencer::step::GATE,
                ],
            );
            g.set_value(&gate, true.into())?;
        }
        Ok(())
    })?;
    Ok(())
}
