//! `cpm-mutate`: offline dry run of the control-plane mutator
//!
//! Reads a `new` object (and optionally the `old` one) plus the cluster it
//! belongs to, runs it through a mutator backed by the no-op ensurer and
//! prints the result.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use cpm_model::{Cluster, Object};
use cpm_webhook::{LogFormat, Mutator, MutatorConfig, NoopEnsurer, StaticClusterAccessor};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("cpm-mutate")
        .version(cpm_webhook::VERSION)
        .about("Run a control-plane object through the mutator")
        .arg(
            Arg::new("new")
                .long("new")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Object to mutate (YAML or JSON)"),
        )
        .arg(
            Arg::new("old")
                .long("old")
                .value_parser(value_parser!(PathBuf))
                .help("Previous version of the object"),
        )
        .arg(
            Arg::new("cluster")
                .long("cluster")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Cluster the object belongs to"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Mutator configuration file"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .default_value("yaml")
                .value_parser(["yaml", "json"])
                .help("Output format"),
        )
}

#[derive(Debug)]
struct Invocation {
    new: PathBuf,
    old: Option<PathBuf>,
    cluster: PathBuf,
    config: Option<PathBuf>,
    json: bool,
}

impl Invocation {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let path = |id: &str| matches.get_one::<PathBuf>(id).cloned();
        Ok(Self {
            new: path("new").context("--new is required")?,
            old: path("old"),
            cluster: path("cluster").context("--cluster is required")?,
            config: path("config"),
            json: matches.get_one::<String>("output").is_some_and(|o| o == "json"),
        })
    }

    fn load_config(&self) -> Result<MutatorConfig> {
        match &self.config {
            Some(path) => Ok(MutatorConfig::from_file(path)?),
            None => Ok(MutatorConfig::default()),
        }
    }
}

fn read_object(path: &Path) -> Result<Object> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    Object::from_yaml_str(&text).with_context(|| format!("could not parse {}", path.display()))
}

fn read_cluster(path: &Path) -> Result<Cluster> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    Cluster::from_yaml_str(&text).with_context(|| format!("could not parse {}", path.display()))
}

fn init_tracing(config: &MutatorConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second initialization only fails when a subscriber is already set.
    let _ = match config.log.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Run one mutation and render the mutated object
async fn run(invocation: &Invocation, config: MutatorConfig) -> Result<String> {
    let mut new = read_object(&invocation.new)?;
    let old = invocation.old.as_deref().map(read_object).transpose()?;
    let cluster = read_cluster(&invocation.cluster)?;

    let accessor = StaticClusterAccessor::new().with_cluster(new.namespace(), cluster);
    let mutator = Mutator::builder(Arc::new(accessor))
        .ensurer(Arc::new(NoopEnsurer))
        .config(config)
        .build();

    tracing::debug!(kind = %new.kind_name(), namespace = %new.namespace(), "Loaded object");
    mutator
        .mutate(&mut new, old.as_ref())
        .await
        .with_context(|| format!("mutation of {} failed", invocation.new.display()))?;

    let value = new.to_value()?;
    if invocation.json {
        Ok(serde_json::to_string_pretty(&value)?)
    } else {
        Ok(serde_yaml::to_string(&value)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let invocation = Invocation::from_matches(&matches)?;
    let config = invocation.load_config()?;
    init_tracing(&config);

    let rendered = run(&invocation, config).await?;
    println!("{}", rendered.trim_end());
    Ok(())
}
