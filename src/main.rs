//! sitesmith - interactive entry point.

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use sitesmith::agent::{AgentLoopConfig, SiteHooks};
use sitesmith::config::{Config, Target};
use sitesmith::context::Context;
use sitesmith::events::{EventBus, EventType, Subsystem};
use sitesmith::llm::Backends;
use sitesmith::project::ProjectRules;
use sitesmith::repl::LineEditor;
use sitesmith::session::Session;
use sitesmith::tools::ToolContext;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sitesmith", version, about = "Build small websites by asking for them")]
struct Args {
    /// Model and backend as model@backend
    #[arg(long, env = "SITESMITH_TARGET")]
    target: Option<String>,

    /// Workspace directory tools run in
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Maximum model calls per request
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_turns: Option<u32>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log everything, including tool timings
    #[arg(long)]
    debug: bool,

    /// Run a single request and exit
    #[arg(short = 'p', long = "prompt")]
    prompt: Option<String>,
}

fn init_tracing(args: &Args) {
    let default = if args.debug {
        "sitesmith=debug"
    } else if args.verbose {
        "sitesmith=info"
    } else {
        "sitesmith=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(&args);

    let config = Config::load()?;

    let target = match &args.target {
        Some(t) => Target::parse(t).ok_or_else(|| anyhow!("Invalid target '{}', expected model@backend", t))?,
        None => config
            .default_target()
            .ok_or_else(|| anyhow!("Invalid target in config, expected model@backend"))?,
    };

    let root = args
        .dir
        .canonicalize()
        .with_context(|| format!("Workspace {} not found", args.dir.display()))?;
    info!(workspace = %root.display(), %target, "starting");

    let bus = EventBus::new();
    bus.subscribe_filtered(vec![Subsystem::Project], |event| {
        if let EventType::ProjectChanged { current, .. } = &event.event_type {
            eprintln!("Active project: {}", current);
        }
    });

    let ctx = Context::new(
        target.clone(),
        ToolContext::new(root, config.bash.clone()),
        ProjectRules::new(config.project.project_files()),
    )
    .with_bus(bus);

    let loop_config = AgentLoopConfig::default()
        .with_max_iterations(
            args.max_turns
                .map(|n| n as usize)
                .unwrap_or(config.agent.max_iterations()),
        )
        .with_temperature(config.agent.temperature());

    let mut backends = Backends::new(config);
    let client = backends.get_client(&target.backend)?;
    let mut session = Session::new(client, SiteHooks, ctx, loop_config);

    if let Some(prompt) = &args.prompt {
        let result = session.handle_request(prompt);
        session.end();
        let result = result?;
        println!("{}", result.response_text);
        return Ok(());
    }

    let mut editor = LineEditor::new()?;
    let mut stdout = std::io::stdout();
    session.run(&mut editor, &mut stdout)
}
