//! # docqa CLI
//!
//! The `docqa` binary ingests PDFs, answers questions about them and serves
//! the same operations over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docqa [--config ./docqa.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa list` | List processed documents |
//! | `docqa ingest <PDF>` | Upload and index a PDF |
//! | `docqa ask <DOC> "<question>"` | Answer one question |
//! | `docqa chat <DOC>` | Interactive question loop with history |
//! | `docqa serve` | Start the HTTP API |
//!
//! Settings come from the environment (and `.env`); `--config` adds a TOML
//! file underneath them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use docqa::config::{self, Settings};
use docqa::embedding::create_embedder;
use docqa::files::FileManager;
use docqa::ingest::Ingestor;
use docqa::llm::create_completer;
use docqa::logging;
use docqa::query::QueryEngine;
use docqa::server;
use docqa::session::{HistoryEntry, Session};

/// docqa: ask questions about your PDF documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering over PDF documents",
    version,
    long_about = "docqa splits PDFs into chunks, embeds them into a per-document vector index \
    and answers questions by retrieving the most relevant chunks and asking a language model."
)]
struct Cli {
    /// Optional TOML settings file. Environment variables take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents that have a vector index.
    List,

    /// Copy a PDF into the upload directory and build its index.
    ///
    /// The document id is the file name without extension. A document is
    /// indexed once; ingesting the same name again fails.
    Ingest {
        /// Path to the PDF file.
        path: PathBuf,
    },

    /// Ask a single question about a processed document.
    Ask {
        /// Document id (file name without extension).
        document: String,
        /// The question.
        question: String,
    },

    /// Ask questions interactively.
    ///
    /// Any line is a question. `/history` lists previous questions,
    /// `/show <n>` redisplays one, `/docs` lists documents and `/quit` exits.
    Chat {
        /// Document id (file name without extension).
        document: String,
    },

    /// Start the HTTP API on HOST:PORT.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Arc::new(config::load_settings(cli.config.as_deref())?);
    logging::init(&settings.paths.log_file)?;
    tracing::info!(?settings, "configuration loaded");

    let files = FileManager::new(&settings.paths.upload_dir, &settings.paths.index_root);

    match cli.command {
        Commands::List => {
            let documents = files.list_processed_files()?;
            if documents.is_empty() {
                println!("No processed documents.");
            }
            for doc in documents {
                println!("{}", doc);
            }
        }
        Commands::Ingest { path } => {
            run_ingest(settings, files, &path).await?;
        }
        Commands::Ask { document, question } => {
            let engine = query_engine(&settings, &files)?;
            let mut session = Session::new();
            match session.ask(&engine, &document, &question).await {
                Ok(entry) => print_entry(entry),
                Err(e) => {
                    tracing::error!(kind = e.kind(), error = %e, "question failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Chat { document } => {
            let engine = query_engine(&settings, &files)?;
            run_chat(&engine, &files, &document).await?;
        }
        Commands::Serve => {
            server::run_server(settings).await?;
        }
    }

    Ok(())
}

async fn run_ingest(settings: Arc<Settings>, files: FileManager, path: &Path) -> anyhow::Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file name: {}", path.display()))?
        .to_string();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let embedder = create_embedder(&settings)?;
    let ingestor = Ingestor::new(settings, files, embedder);
    let report = ingestor.ingest_upload(&filename, &bytes).await?;

    println!(
        "Processed {}: {} pages, {} chunks ({} dims)",
        report.document_id, report.pages, report.chunks, report.dims
    );
    Ok(())
}

fn query_engine(settings: &Settings, files: &FileManager) -> anyhow::Result<QueryEngine> {
    let embedder = create_embedder(settings)?;
    let completer = create_completer(settings)?;
    Ok(QueryEngine::new(
        Arc::new(files.indexes().clone()),
        embedder,
        completer,
        settings.retrieval.top_k,
    ))
}

fn print_entry(entry: &HistoryEntry) {
    println!("Q: {}", entry.question);
    println!("A: {}", entry.answer);
    if !entry.chunks.is_empty() {
        println!();
        println!("Sources:");
        for hit in &entry.chunks {
            let preview: String = hit.chunk.text.chars().take(80).collect();
            println!(
                "  [page {}] {:.3}  {}",
                hit.chunk.page,
                hit.score,
                preview.replace('\n', " ")
            );
        }
    }
}

async fn run_chat(engine: &QueryEngine, files: &FileManager, document: &str) -> anyhow::Result<()> {
    let mut session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Asking about '{}'. Type /quit to exit.", document);
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

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) => break,
            ("/docs", _) => match files.list_processed_files() {
                Ok(docs) => {
                    for doc in docs {
                        println!("{}", doc);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            },
            ("/history", _) => {
                if session.is_empty() {
                    println!("No questions yet.");
                }
                for (i, entry) in session.history().iter().enumerate() {
                    let marker = if session.selected() == Some(i) { "*" } else { " " };
                    println!("{}{:>3}  {}", marker, i, entry.label());
                }
            }
            ("/show", arg) => match arg.parse::<usize>() {
                Ok(n) => match session.select(n) {
                    Ok(entry) => print_entry(entry),
                    Err(e) => eprintln!("error: {}", e),
                },
                Err(_) => eprintln!("usage: /show <n>"),
            },
            _ => match session.ask(engine, document, line).await {
                Ok(entry) => print_entry(entry),
                Err(e) => {
                    tracing::error!(kind = e.kind(), error = %e, "question failed");
                    eprintln!("error: {}", e);
                }
            },
        }
    }

    Ok(())
}
