use anyhow::Result;
use clap::{Parser, Subcommand};
use lexvar_core::{
    CorpusSource, DirCorpus, IndexBuilder, JsonCorpus, Language, LanguageResources, TextNormalizer, VariantCatalog,
    VariantSpec,
};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, compare and query TF-IDF index variants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every variant from a JSON corpus file or a directory of text files
    Build {
        /// Input path (JSON file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output catalog directory
        #[arg(long)]
        output: PathBuf,
        /// Key to descend into before reading a JSON corpus, e.g. "ipea"
        #[arg(long)]
        root_key: Option<String>,
        /// JSON file with a variant registry replacing the default five
        #[arg(long)]
        variants: Option<PathBuf>,
        /// Corpus language: portuguese or english
        #[arg(long, default_value = "portuguese")]
        language: Language,
        /// Stopword list replacing the embedded one, one word per line
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
    /// Print build statistics of every variant in a catalog
    Compare {
        #[arg(long)]
        index: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
    /// Rank documents for a query in one variant, or in all of them
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        query: String,
        /// Variant to search; all variants when omitted
        #[arg(long)]
        variant: Option<String>,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, root_key, variants, language, stopwords } => {
            build_catalog(&input, &output, root_key, variants.as_deref(), language, stopwords.as_deref())
        }
        Commands::Compare { index, json, stopwords } => {
            let catalog = VariantCatalog::open(&index, stopwords.as_deref())?;
            let comparison = catalog.compare_variants();
            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                print!("{comparison}");
            }
            Ok(())
        }
        Commands::Search { index, query, variant, top, stopwords } => {
            let catalog = VariantCatalog::open(&index, stopwords.as_deref())?;
            let results = match variant {
                Some(name) => vec![(name.clone(), catalog.search(&name, &query, top)?)],
                None => catalog.search_all(&query, top)?,
            };
            println!("Results for: {query:?}");
            for (name, hits) in results {
                println!("\n{name}: {} documents", hits.len());
                for (rank, (doc_id, score)) in hits.iter().enumerate() {
                    println!("  {}. {doc_id} (score: {score:.4})", rank + 1);
                }
            }
            Ok(())
        }
    }
}

fn build_catalog(
    input: &Path,
    output: &Path,
    root_key: Option<String>,
    variants: Option<&Path>,
    language: Language,
    stopwords: Option<&Path>,
) -> Result<()> {
    let resources = match stopwords {
        Some(path) => LanguageResources::with_stopword_file(language, path)?,
        None => LanguageResources::embedded(language)?,
    };
    let normalizer = TextNormalizer::new(resources);
    let registry = match variants {
        Some(path) => VariantSpec::load_registry(path)?,
        None => VariantSpec::default_catalog(),
    };

    let catalog = if input.is_dir() {
        build_from(DirCorpus::new(input), normalizer, registry)?
    } else {
        let mut source = JsonCorpus::new(input);
        if let Some(key) = root_key {
            source = source.with_root_key(key);
        }
        build_from(source, normalizer, registry)?
    };

    catalog.save(output)?;
    print!("{}", catalog.compare_variants());
    tracing::info!(output = %output.display(), "catalog build complete");
    Ok(())
}

fn build_from<S: CorpusSource>(source: S, normalizer: TextNormalizer, registry: Vec<VariantSpec>) -> Result<VariantCatalog> {
    Ok(IndexBuilder::new(source, normalizer).with_registry(registry).build()?)
}
