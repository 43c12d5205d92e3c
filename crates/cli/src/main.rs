use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use quell_core::{FieldPath, GroupVersionKind, LifecycleEvent, ManagedObject, Unstructured};
use quell_predicate::{DependentPredicate, GenerationChangedPredicate, Level, Predicate, PredicateConfig, TracingSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "quellctl", version, about = "Evaluate dependent-resource event predicates")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Predicate to evaluate
    #[arg(long = "predicate", value_enum, global = true, default_value_t = PredicateKind::Dependent)]
    predicate: PredicateKind,

    /// Extra dotted path to ignore on updates (repeatable), e.g. metadata.managedFields
    #[arg(long = "ignore", global = true)]
    ignore: Vec<String>,

    /// Level for decision diagnostics
    #[arg(long = "trace-level", value_enum, global = true)]
    trace_level: Option<TraceLevel>,

    /// Only accept manifests of this kind, e.g. "v1/ConfigMap" or "apps/v1/Deployment"
    #[arg(long = "gvk", global = true)]
    gvk: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PredicateKind { Dependent, Generation }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TraceLevel { Trace, Debug, Info, Warn }

impl From<TraceLevel> for Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Trace => Level::Trace,
            TraceLevel::Debug => Level::Debug,
            TraceLevel::Info => Level::Info,
            TraceLevel::Warn => Level::Warn,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a create event for a manifest ("-" reads stdin)
    Create { file: PathBuf },
    /// Evaluate a delete event for a manifest
    Delete { file: PathBuf },
    /// Evaluate a generic event for a manifest
    Generic { file: PathBuf },
    /// Evaluate an update event between two manifests
    Update { old: PathBuf, new: PathBuf },
    /// Evaluate a list of events from one YAML/JSON file
    Replay { file: PathBuf },
}

/// One entry of a replay file.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum EventSpec {
    Create { object: serde_json::Value },
    Delete { object: serde_json::Value },
    Generic { object: serde_json::Value },
    Update { old: serde_json::Value, new: serde_json::Value },
}

#[derive(Debug, Serialize)]
struct Decision {
    admit: bool,
    event: &'static str,
    object: quell_core::ObjectRef,
}

fn init_tracing() {
    let env = std::env::var("QUELL_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn build_config(cli: &Cli) -> Result<PredicateConfig> {
    let mut cfg = PredicateConfig::from_env();
    for raw in &cli.ignore {
        let p = FieldPath::parse(raw).with_context(|| format!("--ignore {raw}"))?;
        cfg = cfg.with_ignored_path(p);
    }
    if let Some(level) = cli.trace_level {
        cfg.trace_level = level.into();
    }
    Ok(cfg)
}

fn build_predicate(kind: PredicateKind, cfg: &PredicateConfig) -> Box<dyn Predicate<Unstructured>> {
    match kind {
        PredicateKind::Dependent => Box::new(DependentPredicate::with_sink(cfg, TracingSink)),
        PredicateKind::Generation => Box::new(GenerationChangedPredicate::with_sink(cfg, TracingSink)),
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

/// YAML is a superset of JSON, so one parser covers both.
fn parse_value(text: &str) -> Result<serde_json::Value> {
    let val: serde_yaml::Value = serde_yaml::from_str(text).context("parsing YAML")?;
    serde_json::to_value(val).context("converting YAML to JSON")
}

fn manifest(value: serde_json::Value, expect: Option<&GroupVersionKind>) -> Result<Unstructured> {
    let obj = Unstructured::try_from_value(value)?;
    if let Some(want) = expect {
        let got = obj.object_ref().gvk;
        if &got != want {
            return Err(anyhow!(
                "manifest kind {} does not match --gvk {}",
                quell_kubehub::gvk_key(&got),
                quell_kubehub::gvk_key(want)
            ));
        }
    }
    Ok(obj)
}

fn load(path: &Path, expect: Option<&GroupVersionKind>) -> Result<Unstructured> {
    let text = read_source(path)?;
    manifest(parse_value(&text)?, expect).with_context(|| format!("loading {}", path.display()))
}

fn to_event(spec: EventSpec, expect: Option<&GroupVersionKind>) -> Result<LifecycleEvent<Unstructured>> {
    Ok(match spec {
        EventSpec::Create { object } => LifecycleEvent::Created(manifest(object, expect)?),
        EventSpec::Delete { object } => LifecycleEvent::Deleted(manifest(object, expect)?),
        EventSpec::Generic { object } => LifecycleEvent::Generic(manifest(object, expect)?),
        EventSpec::Update { old, new } => {
            LifecycleEvent::Updated { old: manifest(old, expect)?, new: manifest(new, expect)? }
        }
    })
}

fn decide(pred: &dyn Predicate<Unstructured>, event: &LifecycleEvent<Unstructured>) -> Decision {
    Decision { admit: pred.evaluate(event), event: event.kind_str(), object: event.object().object_ref() }
}

fn render(output: Output, decisions: &[Decision]) -> Result<()> {
    match output {
        Output::Human => {
            for d in decisions {
                let verdict = if d.admit { "admit" } else { "suppress" };
                println!("{:<8} {:<8} {}", verdict, d.event, d.object);
            }
        }
        Output::Json => match decisions {
            [one] => println!("{}", serde_json::to_string_pretty(one)?),
            many => println!("{}", serde_json::to_string_pretty(many)?),
        },
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = build_config(&cli)?;
    let expect = cli.gvk.as_deref().map(quell_kubehub::parse_gvk_key).transpose()?;
    let expect = expect.as_ref();
    debug!(?cfg, predicate = ?cli.predicate, "configuration loaded");
    let pred = build_predicate(cli.predicate, &cfg);

    let events = match &cli.command {
        Commands::Create { file } => vec![LifecycleEvent::Created(load(file, expect)?)],
        Commands::Delete { file } => vec![LifecycleEvent::Deleted(load(file, expect)?)],
        Commands::Generic { file } => vec![LifecycleEvent::Generic(load(file, expect)?)],
        Commands::Update { old, new } => {
            vec![LifecycleEvent::Updated { old: load(old, expect)?, new: load(new, expect)? }]
        }
        Commands::Replay { file } => {
            let text = read_source(file)?;
            let specs: Vec<EventSpec> = serde_json::from_value(parse_value(&text)?)
                .with_context(|| format!("decoding events in {}", file.display()))?;
            specs
                .into_iter()
                .enumerate()
                .map(|(i, s)| to_event(s, expect).with_context(|| format!("event #{i}")))
                .collect::<Result<Vec<_>>>()?
        }
    };

    let decisions: Vec<Decision> = events.iter().map(|e| decide(pred.as_ref(), e)).collect();
    let admitted = decisions.iter().filter(|d| d.admit).count();
    info!(events = decisions.len(), admitted, "evaluation finished");
    render(cli.output, &decisions)
}
