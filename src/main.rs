mod library;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lectern_core::Config;

#[derive(Parser, Debug)]
#[command(
    name = "lectern",
    version,
    about = "Ask questions about lecture slides and get feedback on your answers"
)]
struct Cli {
    /// Configuration file (falls back to LECTERN_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder scanned for slide decks
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Extra PDF to index alongside the data folder (repeatable)
    #[arg(long = "pdf", global = true)]
    pdfs: Vec<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index the slide decks and list them
    Sources,
    /// Answer a question from the slides
    Ask { question: String },
    /// Grade an answer against the slides
    Feedback {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },
    /// Interactive session: questions, `/feedback <question> | <answer>`, `/quit`
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = &cli.data_dir {
        config.documents.data_dir.clone_from(dir);
    }
    config.validate()?;

    app::run(cli, config).await
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LECTERN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(feature = "candle")]
mod app {
    use anyhow::Context;
    use lectern_core::bootstrap::{CandleOrchestrator, build_orchestrator};
    use lectern_core::{AnswerResult, Config, FeedbackResult};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::{Cli, Command};
    use crate::library::{self, IndexedDeck};

    pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
        let rag = build_orchestrator(&config)
            .await
            .context("failed to initialize models")?;

        let mut paths = library::scan_pdfs(&config.documents.data_dir).await?;
        paths.extend(cli.pdfs.iter().cloned());
        let decks = library::index_library(&rag, &paths).await?;
        let total: usize = decks.iter().map(|d| d.pages).sum();
        tracing::info!(decks = decks.len(), pages = total, "slides indexed");

        match cli.command {
            Command::Sources => print_sources(&decks, cli.json)?,
            Command::Ask { question } => {
                if let Some(question) = library::require_text("question", &question)
                    && ensure_indexed(&rag).await?
                {
                    let result = rag.answer_question(question).await?;
                    print_answer(&result, cli.json)?;
                }
            }
            Command::Feedback { question, answer } => {
                if let (Some(question), Some(answer)) = (
                    library::require_text("question", &question),
                    library::require_text("student answer", &answer),
                ) && ensure_indexed(&rag).await?
                {
                    let result = rag.provide_feedback(question, answer).await?;
                    print_feedback(&result, cli.json)?;
                }
            }
            Command::Repl => repl(&rag, cli.json).await?,
        }
        Ok(())
    }

    async fn ensure_indexed(rag: &CandleOrchestrator) -> anyhow::Result<bool> {
        if rag.indexed_count().await? == 0 {
            tracing::warn!("no slides indexed; add PDFs to the data folder or pass --pdf");
            return Ok(false);
        }
        Ok(true)
    }

    async fn repl(rag: &CandleOrchestrator, json: bool) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }

            let outcome = if let Some(rest) = line.strip_prefix("/feedback") {
                let (question, answer) = rest.split_once('|').unwrap_or((rest, ""));
                let (Some(question), Some(answer)) = (
                    library::require_text("question", question),
                    library::require_text("student answer", answer),
                ) else {
                    continue;
                };
                if !ensure_indexed(rag).await? {
                    continue;
                }
                rag.provide_feedback(question, answer)
                    .await
                    .map(|r| print_feedback(&r, json))
            } else if ensure_indexed(rag).await? {
                rag.answer_question(line)
                    .await
                    .map(|r| print_answer(&r, json))
            } else {
                continue;
            };

            match outcome {
                Ok(printed) => printed?,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => tracing::error!("request failed: {e}"),
            }
        }
        Ok(())
    }

    fn print_sources(decks: &[IndexedDeck], json: bool) -> anyhow::Result<()> {
        if json {
            let list: Vec<_> = decks
                .iter()
                .map(|d| serde_json::json!({ "source": d.name(), "pages": d.pages }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
            return Ok(());
        }
        if decks.is_empty() {
            println!("No slide decks indexed.");
        }
        for deck in decks {
            println!("{} ({} pages)", deck.name(), deck.pages);
        }
        Ok(())
    }

    fn print_answer(result: &AnswerResult, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(result)?);
            return Ok(());
        }
        println!("{}\n", result.answer);
        print!("{}", library::render_slides("Source", &result.sources));
        Ok(())
    }

    fn print_feedback(result: &FeedbackResult, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(result)?);
            return Ok(());
        }
        println!("{}\n", result.feedback);
        print!(
            "{}",
            library::render_slides("Reference", &result.reference_slides)
        );
        Ok(())
    }
}

#[cfg(not(feature = "candle"))]
mod app {
    use lectern_core::Config;

    use super::Cli;

    #[allow(clippy::unused_async)]
    pub async fn run(_cli: Cli, _config: Config) -> anyhow::Result<()> {
        anyhow::bail!("lectern was built without a model backend; enable the `candle` feature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_feedback() {
        let cli = Cli::try_parse_from([
            "lectern",
            "--json",
            "feedback",
            "--question",
            "What is a CNN?",
            "--answer",
            "A network",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Feedback { .. }));
    }

    #[test]
    fn cli_collects_repeated_pdfs() {
        let cli = Cli::try_parse_from(["lectern", "ask", "why?", "--pdf", "a.pdf", "--pdf", "b.pdf"])
            .unwrap();
        assert_eq!(cli.pdfs, [PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
    }

    #[test]
    fn config_flag_wins() {
        let path = resolve_config_path(Some(Path::new("custom.toml")));
        assert_eq!(path, PathBuf::from("custom.toml"));
    }
}
