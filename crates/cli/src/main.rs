use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use hzcap::solver::{IterationRecord, ProgressSink, TracingSink};
use hzcap::{EstimateCfg, Solver};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;

mod body;
mod provenance;
mod trace;

use body::BodyKind;
use provenance::{write_sidecar, Payload};

#[derive(Parser)]
#[command(name = "hz")]
#[command(about = "Hofer–Zehnder capacity estimates for built-in convex bodies")]
struct Cmd {
    /// Optional run tag; propagated to outputs and logs
    #[arg(long)]
    tag: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Estimate the capacity of one body and write a JSON result
    Estimate(EstimateArgs),
    /// Print a small provenance JSON block
    Report,
}

#[derive(clap::Args, Clone, Debug)]
struct EstimateArgs {
    #[arg(long, value_enum)]
    body: BodyKind,
    /// Ellipsoid semi-axes, one per symplectic plane
    #[arg(long, value_delimiter = ',')]
    axes: Vec<f64>,
    /// Exponent of the ℓ^p ball
    #[arg(long, default_value_t = 4.0)]
    p: f64,
    #[arg(long, default_value_t = 2)]
    half_dim: usize,
    #[arg(long, default_value_t = 200)]
    segments: usize,
    #[arg(long, default_value_t = 100)]
    iterations: usize,
    #[arg(long, default_value_t = 1e-12)]
    epsilon: f64,
    /// Ignore the analytic conjugate gradient and solve for it numerically
    #[arg(long)]
    numeric_dual: bool,
    /// Compare dH against centered differences of H on the starting loop
    #[arg(long)]
    check_gradient: bool,
    /// Write the per-iteration trace as CSV
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Suppress per-iteration log lines
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Serialize)]
struct EstimateResult {
    body: &'static str,
    half_dim: usize,
    segments: usize,
    capacity: f64,
    reference: Option<f64>,
    iterations: usize,
    termination: String,
    last_step: Option<f64>,
    dual_quotient: f64,
    violation: f64,
}

/// Collects records for the trace and optionally logs them.
struct Recorder {
    records: Vec<IterationRecord>,
    log: bool,
}

impl ProgressSink for Recorder {
    fn record(&mut self, rec: &IterationRecord) {
        if self.log {
            TracingSink.record(rec);
        }
        self.records.push(*rec);
    }
}

/// Largest `|dH − Δ H|` on the starting loop accepted without failing the run.
const GRADIENT_CHECK_TOL: f64 = 1e-5;

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Estimate(args) => estimate(&args, cmd.tag).map(|_| ()),
        Action::Report => report(cmd.tag),
    }
}

fn estimate(args: &EstimateArgs, tag: Option<String>) -> Result<EstimateResult> {
    tracing::info!(
        body = args.body.name(),
        half_dim = args.half_dim,
        segments = args.segments,
        iterations = args.iterations,
        tag = ?tag,
        "estimate"
    );
    let body = body::build(
        args.body,
        args.half_dim,
        &args.axes,
        args.p,
        args.numeric_dual,
    )?;
    let mut solver = Solver::new(args.half_dim, args.segments, body.oracle)?;

    let mismatch = if args.check_gradient {
        let worst = solver.oracle().gradient_mismatch(solver.loop_points())?;
        tracing::info!(worst, "gradient_check");
        if worst > GRADIENT_CHECK_TOL {
            bail!("dH disagrees with centered differences of H by {worst:.3e}");
        }
        Some(worst)
    } else {
        None
    };

    let mut recorder = Recorder {
        records: Vec::new(),
        log: !args.quiet,
    };
    let cfg = EstimateCfg {
        iterations: args.iterations,
        epsilon: args.epsilon,
        verbose: !args.quiet,
    };
    let est = solver.estimate_with(cfg, &mut recorder)?;
    tracing::info!(
        capacity = est.capacity,
        iterations = est.iterations,
        termination = ?est.termination,
        "estimate_done"
    );

    let result = EstimateResult {
        body: args.body.name(),
        half_dim: args.half_dim,
        segments: args.segments,
        capacity: est.capacity,
        reference: body.reference,
        iterations: est.iterations,
        termination: format!("{:?}", est.termination),
        last_step: est.last_step,
        dual_quotient: solver.dual_quotient()?,
        violation: solver.constraint_violation()?,
    };

    ensure_parent(&args.out)?;
    std::fs::write(&args.out, serde_json::to_vec_pretty(&result)?)?;

    let params = json!({
        "body": args.body.name(),
        "axes": args.axes,
        "p": args.p,
        "half_dim": args.half_dim,
        "segments": args.segments,
        "iterations": args.iterations,
        "epsilon": args.epsilon,
        "numeric_dual": args.numeric_dual,
        "gradient_mismatch": mismatch,
    });
    let mut payload = Payload::new(params).tagged(tag);
    if let Some(path) = &args.trace {
        trace::write_csv(path, &recorder.records)?;
        payload = payload.with_output(path);
    }
    write_sidecar(&args.out, payload)?;
    Ok(result)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn report(tag: Option<String>) -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "hzcap_version": hzcap::VERSION,
        "tag": tag,
        "params": {},
        "outputs": []
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
