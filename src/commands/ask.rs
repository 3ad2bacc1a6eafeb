//! Ask command - interactive Q&A session over the knowledge base

use std::io;

use anyhow::{Context, Result};
use colored::Colorize;

use kbqa::core::config::Config;
use kbqa::core::error::SetupError;
use kbqa::qa::{build_pipeline, Session, TerminalInput};
use kbqa::search::IndexOutcome;

/// Run the interactive session
pub async fn run() -> Result<()> {
    println!();
    println!("{}", "=== Knowledge Base Q&A System ===".bold());
    println!("{}", "Initializing the Q&A system...".dimmed());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => exit_setup(e),
    };

    let (qa, outcome) = match build_pipeline(&config).await {
        Ok(built) => built,
        Err(e) => exit_setup(e),
    };

    match outcome {
        IndexOutcome::Reused { passages } => println!(
            "{} Knowledge index unchanged, reusing {} passages",
            "→".dimmed(),
            passages.to_string().cyan()
        ),
        IndexOutcome::Rebuilt { passages } => println!(
            "{} Indexed {} passages from {}",
            "✓".green().bold(),
            passages.to_string().cyan(),
            config.paths().knowledge.display()
        ),
    }

    print_welcome(&config);

    let mut input = TerminalInput::new();
    let mut session = Session::new(&qa, io::stdout());
    let summary = session
        .run(&mut input)
        .await
        .context("failed to write to the terminal")?;

    tracing::info!(
        answered = summary.answered,
        failed = summary.failed,
        "session ended"
    );
    Ok(())
}

fn exit_setup(e: SetupError) -> ! {
    tracing::debug!(error = ?e, "setup failed");
    eprintln!(
        "{} {}",
        "Error setting up the QA system:".red().bold(),
        e
    );
    std::process::exit(1);
}

fn print_welcome(config: &Config) {
    println!("{}", welcome_text(config));
    println!(
        "Type {} or {} to end the session.",
        "exit".cyan(),
        "quit".cyan()
    );
}

fn welcome_text(config: &Config) -> String {
    format!(
        "\nWelcome! Ask anything about the contents of {}.\n\
         Each answer is drawn from the {} most relevant passages, listed below it.\n",
        config.paths().knowledge.display(),
        config.top_k
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_names_knowledge_file_not_a_topic() {
        let config = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test-0000000000000000000000".to_string()),
            "KBQA_HOME" => Some("/srv/kb".to_string()),
            _ => None,
        })
        .unwrap();

        let text = welcome_text(&config);
        assert!(text.contains("data/knowledge.txt"));
        assert!(text.contains("3 most relevant passages"));
        let lower = text.to_lowercase();
        assert!(!lower.contains("bird"));
        assert!(!lower.contains("migrat"));
    }
}
