//! aliaslink CLI
//!
//! ```text
//! aliaslink generate        vocabulary → keywords CSV + ambiguous JSON
//! aliaslink authors         name list  → authors JSON
//! aliaslink link-keywords   link unambiguous aliases in every note
//! aliaslink link-authors    link author names in every note
//! aliaslink smart-link      resolve ambiguous aliases through the LLM backend
//! aliaslink all             every step, author stages before keyword stages
//! aliaslink link-text       rewrite stdin to stdout
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use aliaslink::llm::OpenAiDisambiguator;
use aliaslink::{LinkConductor, LinkError, LinkerConfig, RunReport};

/// Vocabulary alias expansion + wikilink rewriting for Markdown notes
#[derive(Parser)]
#[command(name = "aliaslink", author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Report what would change without writing any file
    #[arg(long, global = true)]
    dry_run: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the unambiguous table and ambiguous registry from the vocabulary
    #[command(visible_alias = "gen")]
    Generate,

    /// Build the authors JSON from a plain name list
    Authors,

    /// Link unambiguous aliases across the corpus
    LinkKeywords,

    /// Link author full names and surnames across the corpus
    LinkAuthors,

    /// Resolve ambiguous aliases by context through the LLM backend
    SmartLink,

    /// Run every stage in order
    All,

    /// Rewrite stdin to stdout
    LinkText {
        /// Which rule set to apply
        #[arg(long, value_enum, default_value_t = RuleSource::Keywords)]
        rules: RuleSource,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleSource {
    Keywords,
    Authors,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "aliaslink=debug" } else { "aliaslink=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &RunReport) {
    println!("{}", report.summary());
    for error in &report.errors {
        println!("  ! {} [{}]: {}", error.path.display(), error.phase, error.message);
    }
}

fn generate(conductor: &LinkConductor) -> Result<()> {
    let report = conductor.generate().context("generate failed")?;
    println!(
        "[generate] {} terms, {} aliases: {} unambiguous, {} ambiguous",
        report.terms, report.aliases, report.unambiguous, report.ambiguous
    );
    Ok(())
}

fn authors(conductor: &LinkConductor) -> Result<()> {
    let count = conductor.generate_authors().context("authors failed")?;
    println!("[authors] {} unique authors", count);
    Ok(())
}

/// Contextual stage. An unreachable backend skips the stage, it never fails the run.
async fn smart_link(conductor: &LinkConductor) -> Result<()> {
    let chooser = match OpenAiDisambiguator::from_config(&conductor.config().llm) {
        Ok(chooser) => chooser,
        Err(LinkError::GatewayUnavailable(reason)) => {
            tracing::warn!(%reason, "disambiguation backend unavailable, skipping smart-link");
            println!("[smart-link] skipped: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(model = chooser.model(), "using disambiguation backend");
    let report = conductor.smart_link(&chooser).await.context("smart-link failed")?;
    print_report(&report);
    Ok(())
}

async fn link_text(conductor: &LinkConductor, rules: RuleSource) -> Result<()> {
    let plan = match rules {
        RuleSource::Keywords => conductor.keyword_plan()?,
        RuleSource::Authors => conductor.author_plan()?.0,
    };
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("reading stdin")?;
    let outcome = conductor.link_text(&input, &plan);
    let mut stdout = tokio::io::stdout();
    stdout.write_all(outcome.text.as_bytes()).await?;
    stdout.flush().await?;
    tracing::info!(links = outcome.links.len(), changed = outcome.changed, "linked stdin");
    Ok(())
}

/// Steps of `all`, in run order. Authors go before keywords so full names
/// and surnames are linked before any keyword alias can claim them.
const ALL_STEPS: [Step; 5] = [
    Step::Generate,
    Step::Authors,
    Step::LinkAuthors,
    Step::LinkKeywords,
    Step::SmartLink,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Generate,
    Authors,
    LinkAuthors,
    LinkKeywords,
    SmartLink,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Generate => "generate",
            Step::Authors => "authors",
            Step::LinkAuthors => "link-authors",
            Step::LinkKeywords => "link-keywords",
            Step::SmartLink => "smart-link",
        }
    }

    /// Keyword linking depends on freshly generated tables
    fn needs_tables(self) -> bool {
        matches!(self, Step::LinkKeywords | Step::SmartLink)
    }

    /// Author steps run only when their inputs are configured
    fn configured(self, config: &LinkerConfig) -> bool {
        match self {
            Step::Authors => config.author_names_file.is_some(),
            Step::LinkAuthors => config.authors_json_file.is_some(),
            _ => true,
        }
    }
}

async fn run_all(conductor: &LinkConductor) -> Result<()> {
    let config = conductor.config();
    let mut failed = 0;
    let mut tables_ready = true;

    for step in ALL_STEPS {
        if !step.configured(config) {
            continue;
        }
        if step.needs_tables() && !tables_ready {
            tracing::warn!(stage = step.name(), "skipped, generate failed");
            continue;
        }
        let result = match step {
            Step::Generate => generate(conductor),
            Step::Authors => authors(conductor),
            Step::LinkAuthors => conductor.link_authors().map(|r| print_report(&r)).map_err(Into::into),
            Step::LinkKeywords => conductor.link_keywords().map(|r| print_report(&r)).map_err(Into::into),
            Step::SmartLink => smart_link(conductor).await,
        };
        if let Err(e) = result {
            tracing::error!(stage = step.name(), error = ?e, "stage failed, continuing");
            failed += 1;
            if step == Step::Generate {
                tables_ready = false;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} stage(s) failed", failed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = LinkerConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let conductor = LinkConductor::new(config).with_dry_run(cli.dry_run);

    match cli.command {
        Commands::Generate => generate(&conductor)?,
        Commands::Authors => authors(&conductor)?,
        Commands::LinkKeywords => print_report(&conductor.link_keywords()?),
        Commands::LinkAuthors => print_report(&conductor.link_authors()?),
        Commands::SmartLink => smart_link(&conductor).await?,
        Commands::All => run_all(&conductor).await?,
        Commands::LinkText { rules } => link_text(&conductor, rules).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authors_run_before_keywords() {
        let position = |step: Step| ALL_STEPS.iter().position(|s| *s == step).unwrap();
        assert_eq!(ALL_STEPS[0], Step::Generate);
        assert!(position(Step::Authors) < position(Step::LinkAuthors));
        assert!(position(Step::LinkAuthors) < position(Step::LinkKeywords));
        assert!(position(Step::LinkKeywords) < position(Step::SmartLink));
    }

    #[test]
    fn test_generate_gates_keyword_steps() {
        let gated: Vec<&str> = ALL_STEPS
            .iter()
            .filter(|s| s.needs_tables())
            .map(|s| s.name())
            .collect();
        assert_eq!(gated, vec!["link-keywords", "smart-link"]);
    }

    #[test]
    fn test_author_steps_need_config() {
        let config = LinkerConfig::default();
        assert!(!Step::Authors.configured(&config));
        assert!(!Step::LinkAuthors.configured(&config));
        assert!(Step::LinkKeywords.configured(&config));
    }
}
