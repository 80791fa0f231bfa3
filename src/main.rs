use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use docs_qa::config::RagConfig;
use docs_qa::document::Document;
use docs_qa::embeddings::Embedder;
use docs_qa::gemini::{GeminiClient, GeminiConfig};
use docs_qa::generation::Generator;
use docs_qa::session::Session;

/// Ask questions about your documents; answers come only from their content
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Documents to process (supports text and PDF)
    files: Vec<PathBuf>,

    /// Maximum chunk length in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Keep only the most recent N conversation turns
    #[arg(long)]
    memory_window: Option<usize>,
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Exit,
    Ingest(Vec<PathBuf>),
    History,
    Question(String),
    Nothing,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => return Command::Nothing,
            "exit" | "quit" => return Command::Exit,
            "/history" => return Command::History,
            _ => {}
        }

        match line.strip_prefix("/ingest") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                Command::Ingest(rest.split_whitespace().map(PathBuf::from).collect())
            }
            _ => Command::Question(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment, command line flags take precedence
    let mut config = RagConfig::from_env().context("Invalid RAG configuration")?;
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = args.chunk_overlap {
        config.chunk_overlap = chunk_overlap;
    }
    if args.memory_window.is_some() {
        config.memory_window = args.memory_window;
    }
    config.validate().context("Invalid RAG configuration")?;

    let gemini_config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;
    let gemini = GeminiClient::new(gemini_config);

    let mut session = Session::new(&config, gemini.clone(), gemini)
        .context("Failed to initialize session")?;

    if !args.files.is_empty() {
        ingest_files(&mut session, &args.files).await;
    }

    run_query_loop(&mut session).await.context("Error in query loop")
}

/// Load the files and replace the session's document set
async fn ingest_files<E: Embedder, G: Generator>(session: &mut Session<E, G>, paths: &[PathBuf]) {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match Document::from_file(path) {
            Ok(document) => {
                info!("Loaded {} ({})", document.name, document.mime_type);
                documents.push(document);
            }
            Err(e) => error!("Skipping {}: {:#}", path.display(), e),
        }
    }

    match session.ingest(&documents).await {
        Ok(summary) => println!(
            "Processed {} document(s) into {} chunks. Ask your questions.",
            summary.documents, summary.chunks
        ),
        Err(e) => eprintln!("{}", e),
    }
}

/// Read questions from stdin until `exit`
async fn run_query_loop<E: Embedder, G: Generator>(session: &mut Session<E, G>) -> Result<()> {
    println!("Type a question, '/ingest <files...>' to load documents, '/history' or 'exit'.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        print!("\nYour question: ");
        stdout.flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }

        match Command::parse(&buffer) {
            Command::Exit => break,
            Command::Nothing => continue,
            Command::History => {
                if session.history().is_empty() {
                    println!("No conversation yet.");
                }
                for turn in session.history() {
                    println!("\nYou: {}\nAssistant: {}", turn.question, turn.answer);
                }
            }
            Command::Ingest(paths) => {
                if paths.is_empty() {
                    warn!("/ingest called without files");
                }
                ingest_files(session, &paths).await;
            }
            Command::Question(question) => match session.ask(&question).await {
                Ok(answer) => println!("\n{}", answer),
                Err(e) => eprintln!("{}", e),
            },
        }
    }

    info!("Goodbye!");
    Ok(())
}
