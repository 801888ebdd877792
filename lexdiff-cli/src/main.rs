use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lexdiff_core::chunker::MarkerPattern;
use lexdiff_core::config::Config;
use lexdiff_core::provider::{OllamaProvider, Provider};
use lexdiff_core::{CompareError, RetrievalPolicy, RetrievalResult, Session, VersionLabel};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "lexdiff")]
#[command(about = "Compare two versions of a legal document with a local LLM", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "lexdiff.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest two document versions and ask what changed")]
    Compare {
        #[arg(help = "Old version (.pdf or .docx)")]
        old: PathBuf,

        #[arg(help = "New version (.pdf or .docx)")]
        new: PathBuf,

        #[arg(short, long = "question", help = "Question to ask; repeatable. Reads stdin when omitted")]
        questions: Vec<String>,

        #[arg(short, help = "Units to retrieve per question (default: retrieval.top_k)")]
        k: Option<usize>,

        #[arg(long, help = "Reserve part of the retrieval budget for each version")]
        balanced: bool,
    },

    #[command(about = "Print the units the chunker produces for a document")]
    Chunk {
        file: PathBuf,

        #[arg(short, long, default_value = "OLD")]
        label: String,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "List available models from Ollama")]
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "lexdiff_core=info",
        _ => "lexdiff_core=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Commands::Compare {
            old,
            new,
            questions,
            k,
            balanced,
        } => {
            if balanced {
                config.retrieval.policy = RetrievalPolicy::Balanced;
            }
            compare(config, &old, &new, questions, k).await
        }
        Commands::Chunk { file, label } => chunk(config, &file, &label).await,
        Commands::Show => show_config(&config, &cli.config),
        Commands::Models => list_models(&config).await,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

async fn compare(config: Config, old: &Path, new: &Path, questions: Vec<String>, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let mut session = Session::new(config).context("Failed to set up session")?;

    println!("{} Ingesting {} and {}...", "→".blue(), old.display(), new.display());
    let count = session
        .ingest(old, new)
        .await
        .context("Failed to ingest documents")?;
    println!("{} Indexed {} units", "✓".green().bold(), count);
    if let Some(index) = session.index() {
        let config = session.config();
        for label in [&config.versions.old, &config.versions.new] {
            let label = VersionLabel::new(label.clone());
            let units = index
                .count_by_version()
                .into_iter()
                .find(|(l, _)| *l == label)
                .map_or(0, |(_, n)| n);
            let line = format!("  [{}] {} units", label, units);
            if units == 0 {
                println!("{}", format!("{} (no extractable text; answers will be one-sided)", line).yellow());
            } else {
                println!("{}", line);
            }
        }
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if questions.is_empty() {
        println!("Enter one question per line (Ctrl-D to finish):");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let question = line.trim();
            if !question.is_empty() {
                ask(&session, question, k, &cancel).await?;
            }
            if cancel.is_cancelled() {
                break;
            }
        }
    } else {
        for question in &questions {
            ask(&session, question, k, &cancel).await?;
            if cancel.is_cancelled() {
                break;
            }
        }
    }

    Ok(())
}

async fn ask(session: &Session, question: &str, k: usize, cancel: &CancellationToken) -> Result<()> {
    println!();
    println!("{} {}", "Q:".bold().cyan(), question);
    println!("{}", "A:".bold().cyan());

    let outcome = session
        .compare_streaming(
            question,
            k,
            |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            },
            cancel,
        )
        .await;
    println!();

    let old = VersionLabel::new(session.config().versions.old.clone());
    let new = VersionLabel::new(session.config().versions.new.clone());

    match outcome {
        Ok(comparison) => {
            if session.config().prompt.is_sentinel(&comparison.answer) {
                println!("{}", "(no relevant change found in the retrieved excerpts)".yellow());
            }
            print_citations(&comparison.citations, &old, &new);
            Ok(())
        }
        Err(err @ CompareError::Generation { .. }) => {
            println!("{} {}", "✗".red().bold(), err);
            if let Some(citations) = err.citations() {
                print_citations(citations, &old, &new);
            }
            Ok(())
        }
        Err(err) => Err(err).context("Comparison failed"),
    }
}

fn print_citations(citations: &RetrievalResult, old: &VersionLabel, new: &VersionLabel) {
    println!();
    println!("{}", "Citations:".bold().green());

    for label in [old, new] {
        println!("  {}", format!("[{}]", label).bold());
        let mut any = false;
        for scored in citations.for_version(label) {
            any = true;
            let article = scored
                .unit
                .article_id
                .as_deref()
                .map(|id| format!("Article {}", id))
                .unwrap_or_else(|| "preamble".to_string());
            println!(
                "    {} {} (score {:.3})",
                "•".cyan(),
                article.bold(),
                scored.score
            );
            println!("      {}", preview(&scored.unit.content, 160));
        }
        if !any {
            println!("    {}", "nothing retrieved".dimmed());
        }
    }
}

fn preview(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

async fn chunk(config: Config, file: &Path, label: &str) -> Result<()> {
    use lexdiff_core::{DocumentSource, FileLoader, LegalChunker};

    let chunker = LegalChunker::new(config.chunker).context("Invalid chunker configuration")?;
    let pages = FileLoader::new()
        .load(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let units = chunker.chunk_pages(&pages, &VersionLabel::new(label));

    println!(
        "{} {} pages, {} units",
        "→".blue(),
        pages.len(),
        units.len()
    );
    println!();

    for (i, unit) in units.iter().enumerate() {
        let article = unit.article_id.as_deref().unwrap_or("-");
        let part = unit.part.map(|p| format!(" part {}", p)).unwrap_or_default();
        println!(
            "  {:>3} [{}] Article {}{} ({} chars)",
            i,
            unit.version,
            article.bold(),
            part,
            unit.char_len()
        );
    }

    Ok(())
}

fn show_config(config: &Config, config_path: &Path) -> Result<()> {
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        "built-in defaults".to_string()
    };

    println!("{} ({})", "Current Configuration:".bold().green(), source);
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Timeout:        {}s", config.provider.request_timeout_secs);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!();
    println!("{}", "Chunker:".bold());
    println!("  Max Unit Size:  {}", config.chunker.max_unit_size);
    println!("  Fallback Size:  {}", config.chunker.fallback_chunk_size);
    println!("  Overlap:        {}", config.chunker.fallback_overlap);
    println!("  Min Segment:    {}", config.chunker.min_segment_len);
    let marker = MarkerPattern::for_family(&config.chunker.marker).context("Invalid article marker")?;
    println!("  Marker:         {}", marker);
    println!();
    println!("{}", "Retrieval:".bold());
    println!("  Top K:          {}", config.retrieval.top_k);
    println!("  Policy:         {:?}", config.retrieval.policy);
    println!();
    println!("{}", "Versions:".bold());
    println!("  Old:            {}", config.versions.old);
    println!("  New:            {}", config.versions.new);
    println!();
    println!("{}", "Prompt:".bold());
    let prompt = serde_yaml::to_string(&config.prompt).context("Failed to serialize prompt contract")?;
    for line in prompt.lines() {
        println!("  {}", line);
    }

    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let provider = OllamaProvider::new(config);

    println!("{} Fetching models from {}...", "→".blue(), config.llm.base_url);
    println!();

    let models = provider
        .list_models()
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    for model in models {
        let size_gb = model.size as f64 / (1024.0 * 1024.0 * 1024.0);
        let marker = if model.name == config.llm.model || model.name == config.embedding.model {
            "*".green().bold()
        } else {
            "•".cyan()
        };
        println!("  {} {} ({:.2} GB)", marker, model.name.bold(), size_gb);
    }

    println!();
    println!("Set {} and {} in {} to choose models", "llm.model".bold(), "embedding.model".bold(), "lexdiff.yaml".bold());

    Ok(())
}
