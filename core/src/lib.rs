pub mod builder;
pub mod catalog;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod tokenizer;

pub use builder::IndexBuilder;
pub use catalog::{Comparison, ComparisonRow, Ranked, SkippedDocument, Variant, VariantCatalog, VariantSpec, VariantStats};
pub use corpus::{Corpus, CorpusSource, DirCorpus, JsonCorpus};
pub use error::{Error, Result};
pub use index::*;
pub use tokenizer::{Language, LanguageResources, NormalizerConfig, TextNormalizer};
