//! Several indexes over one corpus, each built with its own normalizer configuration, so that
//! retrieval strategies can be measured and queried side by side.

use crate::corpus::Corpus;
use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::persist::{self, CatalogManifest, IndexPaths, VariantRecord, MANIFEST_VERSION};
use crate::tokenizer::{LanguageResources, NormalizerConfig, TextNormalizer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;

/// A named normalizer configuration to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    #[serde(default)]
    pub config: NormalizerConfig,
}

impl VariantSpec {
    pub fn new(name: impl Into<String>, config: NormalizerConfig) -> Self {
        Self { name: name.into(), config }
    }

    /// The five variants built by default. "basic" and "stemming" share a configuration.
    pub fn default_catalog() -> Vec<VariantSpec> {
        let stemmed = NormalizerConfig::default();
        vec![
            VariantSpec::new("basic", stemmed),
            VariantSpec::new("no-stopwords", NormalizerConfig { apply_stemming: false, ..stemmed }),
            VariantSpec::new("stemming", stemmed),
            VariantSpec::new("bigrams", NormalizerConfig { emit_ngrams: true, ngram_size: 2, ..stemmed }),
            VariantSpec::new("shingles", NormalizerConfig { emit_shingles: true, max_shingle_size: 3, ..stemmed }),
        ]
    }

    /// Reads a registry from a JSON array of `{"name": .., "config": {..}}` objects.
    pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<Vec<VariantSpec>> {
        let path = path.as_ref();
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::InvalidConfig(format!("variant registry {}: {e}", path.display())))
    }
}

/// Per-variant numbers handed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStats {
    pub document_count: u32,
    pub vocabulary_size: usize,
    pub mean_terms_per_document: f64,
    pub postings_count: usize,
    pub build_time_seconds: f64,
    pub serialized_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub doc_id: String,
    pub reason: String,
}

/// One built index together with the configuration it was built with.
#[derive(Debug)]
pub struct Variant {
    name: String,
    config: NormalizerConfig,
    index: InvertedIndex,
    stats: VariantStats,
    skipped: Vec<SkippedDocument>,
}

impl Variant {
    /// Normalizes every document in parallel, then adds them to a fresh index in ascending id
    /// order so doc ids do not depend on scheduling.
    fn build(spec: &VariantSpec, corpus: &Corpus, normalizer: &TextNormalizer) -> Result<Variant> {
        let start = Instant::now();
        let docs: Vec<(&str, &[u8])> = corpus.iter().collect();
        let normalized: Vec<(&str, Result<Vec<String>>)> = docs
            .par_iter()
            .map(|&(id, raw)| (id, normalizer.normalize_bytes(id, raw, &spec.config)))
            .collect();

        let mut index = InvertedIndex::new();
        let mut skipped = Vec::new();
        for (id, terms) in normalized {
            match terms {
                Ok(terms) => {
                    index.add_document(id, &terms)?;
                }
                Err(e) => {
                    tracing::warn!(variant = %spec.name, doc = %id, error = %e, "skipping document");
                    skipped.push(SkippedDocument { doc_id: id.to_string(), reason: e.to_string() });
                }
            }
        }
        let build_time = start.elapsed();
        let stats = variant_stats(&index, build_time, persist::serialized_size(&index));
        tracing::info!(
            variant = %spec.name,
            num_docs = stats.document_count,
            num_terms = stats.vocabulary_size,
            skipped = skipped.len(),
            elapsed_ms = build_time.as_millis() as u64,
            "built variant"
        );
        Ok(Variant { name: spec.name.clone(), config: spec.config, index, stats, skipped })
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn config(&self) -> &NormalizerConfig { &self.config }
    pub fn index(&self) -> &InvertedIndex { &self.index }
    pub fn stats(&self) -> &VariantStats { &self.stats }
    pub fn skipped(&self) -> &[SkippedDocument] { &self.skipped }
    pub fn build_time(&self) -> Duration { Duration::try_from_secs_f64(self.stats.build_time_seconds).unwrap_or_default() }
}

fn variant_stats(index: &InvertedIndex, build_time: Duration, size: u64) -> VariantStats {
    let s = index.stats();
    VariantStats {
        document_count: s.document_count,
        vocabulary_size: s.vocabulary_size,
        mean_terms_per_document: s.mean_terms_per_document,
        postings_count: s.postings_count,
        build_time_seconds: build_time.as_secs_f64(),
        serialized_size_bytes: size,
    }
}

fn check_name(name: &str) -> Result<()> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(Error::InvalidVariantName(name.to_string())) }
}

pub type Ranked = Vec<(String, f64)>;

/// Named variants over one corpus, in registration order.
#[derive(Debug)]
pub struct VariantCatalog {
    normalizer: TextNormalizer,
    corpus: Option<Arc<Corpus>>,
    variants: Vec<Variant>,
}

impl VariantCatalog {
    pub fn new(normalizer: TextNormalizer, corpus: Corpus) -> Self {
        Self { normalizer, corpus: Some(Arc::new(corpus)), variants: Vec::new() }
    }

    pub fn normalizer(&self) -> &TextNormalizer { &self.normalizer }

    /// Builds one variant and registers it under `name`.
    pub fn create_variant(&mut self, name: &str, config: NormalizerConfig) -> Result<&Variant> {
        let spec = VariantSpec::new(name, config);
        self.build_variants(std::slice::from_ref(&spec))?;
        self.variant(name)
    }

    /// Builds every spec, in parallel across variants, and registers them in `specs` order.
    /// Nothing is registered if any spec is rejected.
    pub fn build_variants(&mut self, specs: &[VariantSpec]) -> Result<()> {
        let corpus = self
            .corpus
            .clone()
            .ok_or_else(|| Error::Corpus("catalog was loaded from disk and has no corpus".into()))?;
        let mut names: HashSet<&str> = self.variants.iter().map(|v| v.name.as_str()).collect();
        for spec in specs {
            check_name(&spec.name)?;
            spec.config.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(Error::DuplicateVariant(spec.name.clone()));
            }
        }
        let normalizer = &self.normalizer;
        let built = specs
            .par_iter()
            .map(|spec| Variant::build(spec, &corpus, normalizer))
            .collect::<Result<Vec<_>>>()?;
        self.variants.extend(built);
        Ok(())
    }

    pub fn variant(&self, name: &str) -> Result<&Variant> {
        if self.variants.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        self.variants
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| Error::UnknownVariant(name.to_string()))
    }

    pub fn variants(&self) -> &[Variant] { &self.variants }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool { self.variants.is_empty() }

    pub fn stats(&self, name: &str) -> Result<&VariantStats> {
        self.variant(name).map(Variant::stats)
    }

    /// Normalizes `query` with the configuration `name` was built with and ranks it there.
    pub fn search(&self, name: &str, query: &str, top_n: usize) -> Result<Ranked> {
        let variant = self.variant(name)?;
        Ok(self.rank_in(variant, query, top_n))
    }

    fn rank_in(&self, variant: &Variant, query: &str, top_n: usize) -> Ranked {
        let start = Instant::now();
        let terms = self.normalizer.normalize(query, &variant.config);
        let mut ranked = variant.index.rank_search(&terms);
        let total_hits = ranked.len();
        ranked.truncate(top_n);
        tracing::debug!(
            variant = %variant.name,
            total_hits,
            elapsed_us = start.elapsed().as_micros() as u64,
            "ranked query"
        );
        ranked
    }

    /// Ranks `query` in every variant, each with its own configuration.
    pub fn search_all(&self, query: &str, top_n: usize) -> Result<Vec<(String, Ranked)>> {
        if self.variants.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        Ok(self
            .variants
            .iter()
            .map(|v| (v.name.clone(), self.rank_in(v, query, top_n)))
            .collect())
    }

    /// Documents containing every normalized query term of `query` in variant `name`.
    pub fn boolean_search(&self, name: &str, query: &str) -> Result<Vec<String>> {
        let variant = self.variant(name)?;
        let terms = self.normalizer.normalize(query, &variant.config);
        Ok(variant.index.search(&terms))
    }

    pub fn compare_variants(&self) -> Comparison {
        Comparison {
            rows: self
                .variants
                .iter()
                .map(|v| ComparisonRow { name: v.name.clone(), stats: v.stats.clone(), skipped: v.skipped.len() })
                .collect(),
        }
    }

    /// Writes `<name>.idx` per variant and `catalog.json` into a staging directory next to
    /// `dir`, then swaps it in for `dir`. A failed save leaves the previous catalog as it was.
    /// A non-empty `dir` must already hold a catalog, which is replaced as a whole.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let (dir, staging) = persist::prepare_staging(dir.as_ref())?;
        let paths = IndexPaths::new(&staging);
        let written = self.write_into(&paths);
        if let Err(e) = written {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
        persist::publish_staged(&staging, &dir)?;
        tracing::info!(dir = %dir.display(), variants = self.variants.len(), "saved catalog");
        Ok(())
    }

    fn write_into(&self, paths: &IndexPaths) -> Result<()> {
        for v in &self.variants {
            v.index.save_index(paths.variant(&v.name))?;
        }
        let manifest = CatalogManifest {
            version: MANIFEST_VERSION,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339)?,
            language: self.normalizer.language(),
            variants: self
                .variants
                .iter()
                .map(|v| VariantRecord {
                    name: v.name.clone(),
                    config: v.config,
                    stats: v.stats.clone(),
                    skipped: v.skipped.clone(),
                })
                .collect(),
        };
        persist::save_manifest(paths, &manifest)
    }

    /// Loads a saved catalog. The normalizer must use the language the catalog was built for.
    pub fn load<P: AsRef<Path>>(dir: P, normalizer: TextNormalizer) -> Result<Self> {
        let paths = IndexPaths::new(dir);
        let manifest = persist::load_manifest(&paths)?;
        if manifest.language != normalizer.language() {
            return Err(Error::InvalidConfig(format!(
                "catalog was built for {}, normalizer is {}",
                manifest.language,
                normalizer.language()
            )));
        }
        let mut variants = Vec::with_capacity(manifest.variants.len());
        for record in manifest.variants {
            check_name(&record.name)?;
            let index = persist::load_index(&paths.variant(&record.name))?;
            variants.push(Variant {
                name: record.name,
                config: record.config,
                index,
                stats: record.stats,
                skipped: record.skipped,
            });
        }
        tracing::info!(dir = %paths.root.display(), variants = variants.len(), "loaded catalog");
        Ok(Self { normalizer, corpus: None, variants })
    }

    /// Loads a saved catalog with the language recorded in its manifest, using the embedded
    /// stopword list unless `stopwords` names a file.
    pub fn open<P: AsRef<Path>>(dir: P, stopwords: Option<&Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let language = persist::load_manifest(&IndexPaths::new(dir))?.language;
        let resources = match stopwords {
            Some(path) => LanguageResources::with_stopword_file(language, path)?,
            None => LanguageResources::embedded(language)?,
        };
        Self::load(dir, TextNormalizer::new(resources))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub name: String,
    #[serde(flatten)]
    pub stats: VariantStats,
    pub skipped: usize,
}

/// Side-by-side statistics of every built variant.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>8} {:>12} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "variant", "docs", "vocabulary", "terms/doc", "postings", "size (MB)", "build (s)", "skipped"
        )?;
        for row in &self.rows {
            let s = &row.stats;
            writeln!(
                f,
                "{:<16} {:>8} {:>12} {:>10.2} {:>10} {:>10.2} {:>10.3} {:>8}",
                row.name,
                s.document_count,
                s.vocabulary_size,
                s.mean_terms_per_document,
                s.postings_count,
                s.serialized_size_bytes as f64 / 1024.0 / 1024.0,
                s.build_time_seconds,
                row.skipped
            )?;
        }
        Ok(())
    }
}
