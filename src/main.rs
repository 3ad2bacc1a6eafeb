mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kbqa")]
#[command(
    about = "Ask questions about a local knowledge base (data/knowledge.txt)",
    long_about = "Ask questions about a local knowledge base.\n\n\
        Reads data/knowledge.txt, keeps an embedding index in db/vector_store/, and answers \
        questions with a hosted language model. Requires OPENAI_API_KEY (a .env file is read \
        if present). Type 'exit' or 'quit', or press Ctrl+C, to leave."
)]
#[command(version)]
struct Cli {}

fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();
    kbqa::core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kbqa=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(commands::ask::run());
    // A stdin read may still be parked after Ctrl+C
    runtime.shutdown_background();
    result
}
