use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kurbo::{Affine, Point, Vec2};
use notelink_core::{
    load_scene, place_anchor, save_scene, EditOutcome, LinkConfig, ObjectId,
    PropertyValue, ScriptedInput, SegmentEnd, Session,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "NOTELINK_LOG";

#[derive(Debug, Parser)]
#[command(name = "notelink-cli")]
#[command(about = "Anchor/annotation linkage engine CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON edit script and print the resulting scene.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Save the resulting scene to this file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Engine configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load a saved scene and report its consistency.
    Inspect {
        #[arg(value_name = "SCENE")]
        scene: PathBuf,
        /// Engine configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

/// One scripted edit; object ids are the scene's allocation order.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    /// Place an anchor; without `end` the second prompt is cancelled.
    Place {
        start: [f64; 2],
        end: Option<[f64; 2]>,
    },
    SetNoteKind {
        id: u64,
        kind: String,
    },
    SetName {
        id: u64,
        name: String,
    },
    SetLength {
        id: u64,
        length: f64,
    },
    MoveEndpoint {
        id: u64,
        end: EndArg,
        offset: [f64; 2],
    },
    MoveAnchorPoint {
        id: u64,
        offset: [f64; 2],
    },
    Transform {
        ids: Vec<u64>,
        #[serde(default)]
        translate: [f64; 2],
        #[serde(default)]
        rotate_deg: f64,
    },
    Duplicate {
        ids: Vec<u64>,
        offset: [f64; 2],
    },
    Erase {
        ids: Vec<u64>,
    },
    DragShelf {
        id: u64,
        rack: [f64; 2],
        angle: f64,
    },
    Lock {
        id: u64,
    },
    Undo,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EndArg {
    Start,
    End,
}

impl From<EndArg> for SegmentEnd {
    fn from(end: EndArg) -> Self {
        match end {
            EndArg::Start => SegmentEnd::Start,
            EndArg::End => SegmentEnd::End,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnchorOutput {
    id: u64,
    name: String,
    start: [f64; 2],
    end: [f64; 2],
    anchor_point: [f64; 2],
    note_kind: &'static str,
    note_angle: f64,
    note_distance: f64,
    note_ref: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AnnotationOutput {
    id: u64,
    owner: Option<u64>,
    first_point: [f64; 2],
    rack_point: [f64; 2],
    angle: f64,
    label: String,
}

#[derive(Debug, Serialize)]
struct SceneOutput {
    anchors: Vec<AnchorOutput>,
    annotations: Vec<AnnotationOutput>,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    steps: usize,
    denied: usize,
    cancelled: usize,
    scene: SceneOutput,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    path: String,
    anchors: usize,
    annotations: usize,
    proxies: Vec<u64>,
    skipped: Vec<SkippedOutput>,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SkippedOutput {
    id: u64,
    error: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging();

    match cli.command {
        Commands::Replay { script, output, config } => {
            run_replay(&script, output.as_deref(), config.as_deref())
        }
        Commands::Inspect { scene, config } => run_inspect(&scene, config.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when `run` is called twice in one process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<LinkConfig> {
    match path {
        Some(path) => LinkConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(LinkConfig::default()),
    }
}

fn run_replay(script: &Path, output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    ensure_file_exists(script)?;
    let config = load_config(config)?;

    let json = fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&json).context("failed to parse script")?;

    let mut session = Session::new(config);
    let mut denied = 0;
    let mut cancelled = 0;
    for (index, step) in steps.iter().enumerate() {
        debug!(index, ?step, "replaying step");
        match apply_step(&mut session, step).with_context(|| format!("step {} failed", index + 1))? {
            StepResult::Done => {}
            StepResult::Denied => denied += 1,
            StepResult::Cancelled => cancelled += 1,
        }
    }

    if let Some(output) = output {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        save_scene(session.scene(), output)
            .with_context(|| format!("failed to save scene to {}", output.display()))?;
        info!(path = %output.display(), "scene saved");
    }

    let payload = ReplayOutput {
        steps: steps.len(),
        denied,
        cancelled,
        scene: describe_scene(&session),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

enum StepResult {
    Done,
    Denied,
    Cancelled,
}

impl From<EditOutcome> for StepResult {
    fn from(outcome: EditOutcome) -> Self {
        match outcome {
            EditOutcome::Denied => StepResult::Denied,
            EditOutcome::Applied | EditOutcome::Unchanged => StepResult::Done,
        }
    }
}

fn apply_step(session: &mut Session, step: &Step) -> Result<StepResult> {
    let result = match step {
        Step::Place { start, end } => {
            let mut points = vec![point(*start)];
            points.extend((*end).map(point));
            let mut input = ScriptedInput::points(points);
            match place_anchor(session, &mut input)? {
                Some(_) => StepResult::Done,
                None => StepResult::Cancelled,
            }
        }
        Step::SetNoteKind { id, kind } => session
            .set_property(ObjectId(*id), "NoteKind", PropertyValue::Text(kind.clone()))?
            .into(),
        Step::SetName { id, name } => session.set_name(ObjectId(*id), name)?.into(),
        Step::SetLength { id, length } => session
            .set_property(ObjectId(*id), "Length", PropertyValue::Number(*length))?
            .into(),
        Step::MoveEndpoint { id, end, offset } => {
            session.move_endpoint(ObjectId(*id), (*end).into(), vec2(*offset))?.into()
        }
        Step::MoveAnchorPoint { id, offset } => {
            session.move_anchor_point(ObjectId(*id), vec2(*offset))?.into()
        }
        Step::Transform { ids, translate, rotate_deg } => {
            let affine =
                Affine::translate(vec2(*translate)) * Affine::rotate(rotate_deg.to_radians());
            let ids = object_ids(ids);
            let applied = session.transform(&ids, affine)?;
            if applied < ids.len() {
                StepResult::Denied
            } else {
                StepResult::Done
            }
        }
        Step::Duplicate { ids, offset } => {
            session.duplicate(&object_ids(ids), Affine::translate(vec2(*offset)))?;
            StepResult::Done
        }
        Step::Erase { ids } => {
            session.erase(&object_ids(ids))?;
            StepResult::Done
        }
        Step::DragShelf { id, rack, angle } => {
            session.drag_shelf(ObjectId(*id), point(*rack), *angle)?.into()
        }
        Step::Lock { id } => {
            session.scene_mut().lock(ObjectId(*id));
            StepResult::Done
        }
        Step::Undo => {
            session.undo()?;
            StepResult::Done
        }
    };
    Ok(result)
}

fn run_inspect(path: &Path, config: Option<&Path>) -> Result<()> {
    ensure_file_exists(path)?;
    let config = load_config(config)?;

    let (scene, report) = load_scene(path, &config)
        .with_context(|| format!("failed to load scene {}", path.display()))?;
    let session = Session::from_loaded(scene, config);

    let payload = InspectOutput {
        path: path.display().to_string(),
        anchors: session.scene().anchors().count(),
        annotations: session.scene().annotations().count(),
        proxies: report.proxies.iter().map(|id| id.0).collect(),
        skipped: report
            .skipped
            .iter()
            .map(|(id, error)| SkippedOutput { id: id.0, error: error.to_string() })
            .collect(),
        violations: violations(&session),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn describe_scene(session: &Session) -> SceneOutput {
    let scene = session.scene();
    let anchors = scene
        .anchors()
        .map(|(id, anchor)| AnchorOutput {
            id: id.0,
            name: anchor.name().to_string(),
            start: coords(anchor.geometry().start()),
            end: coords(anchor.geometry().end()),
            anchor_point: coords(anchor.anchor_point()),
            note_kind: anchor.note_kind().label(),
            note_angle: anchor.note_angle(),
            note_distance: anchor.note_distance(),
            note_ref: anchor.note_ref().map(|note| note.0),
        })
        .collect();
    let annotations = scene
        .annotations()
        .map(|(id, annotation)| AnnotationOutput {
            id: id.0,
            owner: session.links().owner_of(id).map(|owner| owner.0),
            first_point: coords(annotation.first_point()),
            rack_point: coords(annotation.rack_point()),
            angle: annotation.angle(),
            label: annotation.label().to_string(),
        })
        .collect();
    SceneOutput { anchors, annotations, violations: violations(session) }
}

fn violations(session: &Session) -> Vec<String> {
    session.check_invariants().iter().map(ToString::to_string).collect()
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn object_ids(ids: &[u64]) -> Vec<ObjectId> {
    ids.iter().copied().map(ObjectId).collect()
}

fn point([x, y]: [f64; 2]) -> Point {
    Point::new(x, y)
}

fn vec2([x, y]: [f64; 2]) -> Vec2 {
    Vec2::new(x, y)
}

fn coords(point: Point) -> [f64; 2] {
    [point.x, point.y]
}
