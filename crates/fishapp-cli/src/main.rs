//! fishapp: apply buffer operations to an image and classify it.
//!
//! Loads an image (or starts from a black canvas), runs each `--op` in
//! order against one session, optionally writes the result as PNG and
//! optionally classifies it.
//!
//! # Usage
//!
//! ```text
//! fishapp photo.jpg --op rotate=90 --op blur=5 -o out.png --classify
//! fishapp --canvas 50x100 --op "text=5,5,95,45,cod" --op pick=10,10 --json
//! ```
//!
//! On failure the process exits non-zero and prints the error's stable
//! code (`invalid_argument`, `out_of_bounds`, ...) before the message.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use fishapp_classify::{ClassLabel, ClassifierConfig, Classifier, ClassifyError, LoadError};
use fishapp_pipeline::{Color, Operation, Outcome, PipelineError, Session};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Apply image operations and classify the result.
#[derive(Parser)]
#[command(name = "fishapp", version)]
struct Cli {
    /// Input image (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "canvas")]
    input: Option<PathBuf>,

    /// Start from a black canvas instead of an input file, given as HEIGHTxWIDTH.
    #[arg(long, value_name = "HxW", conflicts_with = "input")]
    canvas: Option<Canvas>,

    /// Operation to apply, in order (e.g. `rotate=90`, `crop=10,10,50,40`,
    /// `blur=5`, `pick=3,4`). Repeatable.
    #[arg(long = "op", value_name = "OP")]
    ops: Vec<Operation>,

    /// Write the resulting image as PNG.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Classify the resulting image.
    #[arg(long)]
    classify: bool,

    /// Full classifier config as a JSON file.
    ///
    /// When provided, the other classifier flags are ignored.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ONNX model file.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Label file, one class per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Number of ranked labels to print.
    #[arg(long)]
    top_k: Option<usize>,

    /// Shortest-edge length before the 224px center crop.
    #[arg(long)]
    resize_edge: Option<u32>,

    /// Abandon inference after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print results as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Log at debug level (overrides `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Canvas size parsed from `HEIGHTxWIDTH`.
#[derive(Clone, Copy, Debug)]
struct Canvas {
    height: u32,
    width: u32,
}

impl FromStr for Canvas {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, w) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected HEIGHTxWIDTH, got {s:?}"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid canvas size {s:?}: {e}"))
        };
        Ok(Self {
            height: parse(h)?,
            width: parse(w)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Stable code printed ahead of the message.
    const fn code(&self) -> &'static str {
        match self {
            Self::Pipeline(e) => e.kind().code(),
            Self::Classify(e) => e.kind().code(),
            Self::Load(e) => e.kind().code(),
            Self::Io { .. } => "io_error",
            Self::Json(_) => "output_error",
        }
    }
}

/// A colour sampled by a `pick` operation.
#[derive(serde::Serialize)]
struct Pick {
    x: i32,
    y: i32,
    color: Color,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the classifier config from `--config` or the individual flags.
fn classifier_config(cli: &Cli) -> Result<ClassifierConfig, LoadError> {
    if let Some(path) = &cli.config {
        return ClassifierConfig::from_json_file(path);
    }
    let defaults = ClassifierConfig::default();
    let config = ClassifierConfig {
        model_path: cli.model.clone().unwrap_or(defaults.model_path),
        labels_path: cli.labels.clone().unwrap_or(defaults.labels_path),
        top_k: cli.top_k.unwrap_or(defaults.top_k),
        resize_edge: cli.resize_edge.unwrap_or(defaults.resize_edge),
        inference_timeout_ms: cli.timeout_ms.or(defaults.inference_timeout_ms),
    };
    config.validate()?;
    Ok(config)
}

fn open_session(cli: &Cli) -> Result<Session, CliError> {
    let mut session = Session::new();
    match (&cli.canvas, &cli.input) {
        (Some(canvas), _) => session.new_canvas(canvas.height, canvas.width)?,
        (None, Some(path)) => {
            let bytes = std::fs::read(path).map_err(|source| CliError::Io {
                action: "failed to read",
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), bytes = bytes.len(), "read input");
            session.load(&bytes)?;
        }
        (None, None) => {
            return Err(PipelineError::NoImage.into());
        }
    }
    Ok(session)
}

fn classify(cli: &Cli, session: &Session) -> Result<Vec<ClassLabel>, CliError> {
    let config = classifier_config(cli)?;
    let classifier = Classifier::load_or_unavailable(&config);
    let buffer = session.image()?;
    let ranked = match config.inference_timeout() {
        Some(timeout) => classifier.classify_with_timeout(buffer, config.top_k, timeout)?,
        None => classifier.classify(buffer, config.top_k)?,
    };
    Ok(ranked)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let mut session = open_session(cli)?;

    let mut picks = Vec::new();
    for op in &cli.ops {
        let outcome = session.apply(op)?;
        if let (Operation::Pick { point }, Outcome::Color(color)) = (op, outcome) {
            picks.push(Pick {
                x: point.x,
                y: point.y,
                color,
            });
        }
    }

    if let Some(path) = &cli.output {
        let png = session.export_png()?;
        std::fs::write(path, &png).map_err(|source| CliError::Io {
            action: "failed to write",
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = png.len(), "wrote image");
    }

    let predictions = if cli.classify {
        Some(classify(cli, &session)?)
    } else {
        None
    };

    let dimensions = session.image()?.dimensions();
    if cli.json {
        let report = serde_json::json!({
            "width": dimensions.width,
            "height": dimensions.height,
            "picks": picks,
            "predictions": predictions,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("image: {dimensions}");
        for pick in &picks {
            println!("pick ({}, {}): {}", pick.x, pick.y, pick.color);
        }
        for (rank, label) in predictions.iter().flatten().enumerate() {
            println!("{}. {} ({:.2}%)", rank + 1, label.label, label.percentage());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[{}]: {e}", e.code());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fishapp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn canvas_parses_height_then_width() {
        let canvas: Canvas = "50x100".parse().unwrap();
        assert_eq!((canvas.height, canvas.width), (50, 100));
        assert!("50".parse::<Canvas>().is_err());
        assert!("ax3".parse::<Canvas>().is_err());
    }

    #[test]
    fn ops_parse_in_order() {
        let cli = parse(&["--canvas", "10x10", "--op", "rotate=90", "--op", "pick=1,2"]);
        assert_eq!(cli.ops.len(), 2);
        assert_eq!(cli.ops[0].name(), "rotate");
        assert_eq!(cli.ops[1].name(), "pick");
    }

    #[test]
    fn bad_op_is_a_usage_error() {
        let args = ["fishapp", "--canvas", "10x10", "--op", "rotate=45"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn input_or_canvas_required() {
        assert!(Cli::try_parse_from(["fishapp"]).is_err());
    }

    #[test]
    fn flags_fill_classifier_config() {
        let cli = parse(&["in.png", "--top-k", "5", "--labels", "l.txt", "--timeout-ms", "20"]);
        let config = classifier_config(&cli).unwrap();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.labels_path, PathBuf::from("l.txt"));
        assert_eq!(config.inference_timeout(), Some(Duration::from_millis(20)));
        assert_eq!(config.model_path, ClassifierConfig::default().model_path);
    }

    #[test]
    fn invalid_flags_rejected() {
        let cli = parse(&["in.png", "--top-k", "0"]);
        assert_eq!(
            CliError::from(classifier_config(&cli).unwrap_err()).code(),
            "invalid_argument"
        );
    }

    #[test]
    fn canvas_session_runs_ops() {
        let cli = parse(&["--canvas", "50x100", "--op", "rotate=90"]);
        let mut session = open_session(&cli).unwrap();
        for op in &cli.ops {
            session.apply(op).unwrap();
        }
        let dims = session.image().unwrap().dimensions();
        assert_eq!((dims.width, dims.height), (50, 100));
    }

    #[test]
    fn missing_input_is_io_error() {
        let cli = parse(&["/nonexistent/in.png"]);
        let err = open_session(&cli).unwrap_err();
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn classify_without_model_reports_unavailable() {
        let cli = parse(&["--canvas", "4x4", "--labels", "/nonexistent/labels.txt"]);
        let session = open_session(&cli).unwrap();
        let err = classify(&cli, &session).unwrap_err();
        assert_eq!(err.code(), "service_unavailable");
    }
}
