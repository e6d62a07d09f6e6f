use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;

use flowchat::config::{ChatArgs, Cli, Command, Mode};
use flowchat::flow::TreeStore;
use flowchat::frontend::{self, LineFrontend, RetainedFrontend};
use flowchat::oracle::OracleClient;

fn main() -> Result<()> {
    // GEMINI_API_KEY and friends may live in a .env file.
    dotenv().ok();

    // Logs go to stderr. Control verbosity with RUST_LOG:
    //   RUST_LOG=info   transitions and session lifecycle
    //   RUST_LOG=debug  + oracle instructions and raw answers
    //   RUST_LOG=trace  + request bodies and model thinking
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let tree = TreeStore::load(&cli.tree, cli.root.as_deref())
        .with_context(|| format!("failed to load {}", cli.tree.display()))?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Check => {
            let report = tree.report();
            println!("Conversation tree: {}", cli.tree.display());
            print!("{report}");
            if report.is_clean() {
                println!("OK");
            }
            Ok(())
        }
        Command::Chat => chat(Arc::new(tree), &cli.chat),
    }
}

fn chat(tree: Arc<TreeStore>, args: &ChatArgs) -> Result<()> {
    let backend = args
        .build_backend()
        .context("failed to configure the oracle")?;
    let oracle = OracleClient::from_boxed(backend);

    info!(
        "Starting chat at '{}' ({} nodes, {:?} mode)",
        tree.root_id(),
        tree.len(),
        args.mode
    );

    match args.mode {
        Mode::Line => {
            println!("Flow-based chatbot. Type '/quit' to leave.\n");
            frontend::run(tree, &oracle, &mut LineFrontend::stdio())
        }
        Mode::Retained => frontend::run(tree, &oracle, &mut RetainedFrontend::stdio()),
    }
}
