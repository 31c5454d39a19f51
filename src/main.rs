//! Gantry - synthesize workload stack templates

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gantry::app::App;
use gantry::stacks::{WorkloadStack, WorkloadStackProps};

/// Gantry - declarative infrastructure stack synthesis for containerized workloads
#[derive(Parser, Debug)]
#[command(name = "gantry", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize workload stack templates
    ///
    /// Builds the selected stack variant (or all three), synthesizes each
    /// inside a disposable app root, and prints the templates or writes
    /// them into an output directory. No cloud calls are made.
    Synth(SynthArgs),
}

/// Synth mode arguments
#[derive(Parser, Debug)]
struct SynthArgs {
    /// Stack variant to synthesize; all three when omitted
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    /// Write one file per stack into this directory instead of stdout
    #[arg(long, env = "GANTRY_OUT_DIR")]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Federated service account on the earliest pinned version
    Federated,
    /// Pod-identity association on the newest pinned version
    PodIdentity,
    /// Both binding mechanisms side by side
    Dual,
}

impl Variant {
    fn stack_name(self) -> &'static str {
        match self {
            Variant::Federated => "FederatedStack",
            Variant::PodIdentity => "PodIdentityStack",
            Variant::Dual => "DualIdentityStack",
        }
    }

    fn props(self) -> WorkloadStackProps {
        match self {
            Variant::Federated => WorkloadStackProps::federated(),
            Variant::PodIdentity => WorkloadStackProps::pod_identity(),
            Variant::Dual => WorkloadStackProps::dual(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth(args) => run_synth(args),
    }
}

/// Build the selected variants, synthesize, and emit the templates
fn run_synth(args: SynthArgs) -> anyhow::Result<()> {
    let variants: Vec<Variant> = match args.variant {
        Some(variant) => vec![variant],
        None => vec![Variant::Federated, Variant::PodIdentity, Variant::Dual],
    };

    let mut app = App::new();
    for variant in &variants {
        WorkloadStack::add_to(&mut app, variant.stack_name(), variant.props());
    }

    let assembly = app.synth().context("failed to synthesize stacks")?;

    for (name, template) in assembly.templates() {
        let rendered = match args.format {
            Format::Json => template.to_json()?,
            Format::Yaml => template.to_yaml()?,
        };

        match &args.out {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = dir.join(format!("{}.{}", name, args.format.extension()));
                std::fs::write(&path, &rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
            None => {
                if args.format == Format::Yaml {
                    println!("---");
                }
                println!("{rendered}");
            }
        }
    }

    Ok(())
}
