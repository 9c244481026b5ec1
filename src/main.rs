//! relex CLI: bootstrapped relation extraction.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};

use snowball_relex::cluster::ClusterLabel;
use snowball_relex::config::SnowballConfig;
use snowball_relex::corpus::{Document, Sentence};
use snowball_relex::registry::SnowballRegistry;
use snowball_relex::snowball::Snowball;

#[derive(Parser)]
#[command(name = "relex", version, about = "Bootstrapped relation extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file for a property.
    Init {
        /// Property name (built-in: curie_temperatures, neel_temperatures).
        #[arg(long)]
        property: String,

        /// Where to write the TOML config.
        #[arg(long)]
        output: PathBuf,
    },

    /// Train a learner from seed relations and a corpus.
    Train {
        /// TOML config with the property, thresholds and seeds.
        #[arg(long, required_unless_present = "resume")]
        config: Option<PathBuf>,

        /// Plain-text corpus files (one sentence per line).
        #[arg(long, required = true, num_args = 1..)]
        corpus: Vec<PathBuf>,

        /// Snapshot file to write.
        #[arg(long)]
        state: PathBuf,

        /// Continue training the learner already stored in --state.
        #[arg(long)]
        resume: bool,

        /// Also write text reports into this directory.
        #[arg(long)]
        reports: Option<PathBuf>,
    },

    /// Extract relations from text with one or more trained learners.
    Extract {
        /// Snapshot files, one per property.
        #[arg(long, required = true, num_args = 1..)]
        state: Vec<PathBuf>,

        /// Plain-text input (one sentence per line).
        #[arg(long)]
        input: PathBuf,

        /// Save the updated learners into this directory as <property>.json.
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },

    /// Write text reports for a trained learner.
    Report {
        #[arg(long)]
        state: PathBuf,

        /// Output directory.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Show learner statistics and clusters.
    Info {
        #[arg(long)]
        state: PathBuf,
    },

    /// Delete a cluster from a learner.
    DeleteCluster {
        #[arg(long)]
        state: PathBuf,

        /// Cluster label.
        #[arg(long)]
        label: u32,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { property, output } => {
            write_default_config(property, &output)?;
            println!("Wrote {}", output.display());
        }

        Commands::Train {
            config,
            corpus,
            state,
            resume,
            reports,
        } => {
            let mut snowball = match (resume, config) {
                (true, _) => Snowball::load(&state)?,
                (false, Some(path)) => Snowball::new(SnowballConfig::load(&path)?)?,
                (false, None) => miette::bail!("--config is required unless --resume is given"),
            };

            let documents = corpus
                .iter()
                .map(|path| read_document(path))
                .collect::<Result<Vec<_>>>()?;
            let summary = snowball.train(&documents)?;
            snowball.save(&state)?;

            println!(
                "Trained {}: {} sentences, {} matched, {} phrases, {} clusters",
                snowball.property(),
                summary.sentences,
                summary.matched_sentences,
                summary.phrases,
                summary.clusters
            );
            if let Some(dir) = reports {
                for path in snowball.write_reports(&dir, &stem(&state))? {
                    println!("  {}", path.display());
                }
            }
        }

        Commands::Extract {
            state,
            input,
            save_dir,
        } => {
            let mut registry = SnowballRegistry::new();
            registry.load(&state)?;

            let document = read_document(&input)?;
            let sentences: Vec<Sentence> = document.sentences().cloned().collect();
            for record in registry.extract_all(&sentences)? {
                println!("{}", serde_json::to_string(&record).into_diagnostic()?);
            }
            if let Some(dir) = save_dir {
                registry.save_all(&dir)?;
            }
        }

        Commands::Report { state, dir } => {
            let snowball = Snowball::load(&state)?;
            for path in snowball.write_reports(&dir, &stem(&state))? {
                println!("{}", path.display());
            }
        }

        Commands::Info { state } => {
            let snowball = Snowball::load(&state)?;
            let found = snowball.relations().filter(|r| r.is_found()).count();
            println!("Property:   {}", snowball.property());
            println!("Seeds:      {}", snowball.seeds().len());
            println!("Relations:  {} ({found} found)", snowball.relation_count());
            println!("Phrases:    {}", snowball.phrases().len());
            println!("Clusters:   {}", snowball.clusters().len());
            for cluster in snowball.clusters() {
                let confidence = cluster.pattern().map_or(0.0, |p| p.confidence());
                println!(
                    "  [{}] order {} | {} phrases | confidence {:.3}",
                    cluster.label(),
                    cluster.order(),
                    cluster.len(),
                    confidence
                );
                if let Some(pattern) = cluster.pattern() {
                    println!("      {}", pattern.as_string());
                }
            }
        }

        Commands::DeleteCluster { state, label } => {
            let mut snowball = Snowball::load(&state)?;
            let removed = snowball.delete_cluster(ClusterLabel::new(label))?;
            snowball.save(&state)?;
            println!("Deleted cluster {} ({} phrases)", removed.label(), removed.len());
        }
    }

    Ok(())
}

/// Write the default config for a built-in property. Unknown properties
/// are rejected before anything is written.
fn write_default_config(property: String, output: &Path) -> Result<()> {
    let config = SnowballConfig::new(property);
    config.compile_regexes()?;
    config.save(output)?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(Document::from_plain_text(&text))
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snowball".into())
}
