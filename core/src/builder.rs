use crate::catalog::{VariantCatalog, VariantSpec};
use crate::corpus::CorpusSource;
use crate::error::{Error, Result};
use crate::tokenizer::TextNormalizer;

/// Loads a corpus and builds the configured registry of variants over it.
pub struct IndexBuilder<S> {
    source: S,
    normalizer: TextNormalizer,
    registry: Vec<VariantSpec>,
}

impl<S: CorpusSource> IndexBuilder<S> {
    /// A builder for [`VariantSpec::default_catalog`].
    pub fn new(source: S, normalizer: TextNormalizer) -> Self {
        Self { source, normalizer, registry: VariantSpec::default_catalog() }
    }

    pub fn with_registry(mut self, registry: Vec<VariantSpec>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &[VariantSpec] { &self.registry }

    pub fn build(self) -> Result<VariantCatalog> {
        let corpus = self.source.load()?;
        if corpus.is_empty() {
            return Err(Error::Corpus("no documents to index".into()));
        }
        tracing::info!(num_docs = corpus.len(), variants = self.registry.len(), "building catalog");
        let mut catalog = VariantCatalog::new(self.normalizer, corpus);
        catalog.build_variants(&self.registry)?;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::tokenizer::{Language, LanguageResources, NormalizerConfig};

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new(LanguageResources::embedded(Language::Portuguese).unwrap())
    }

    #[test]
    fn builds_default_registry() {
        let corpus: Corpus = [("x", "O gato subiu no telhado"), ("y", "Os gatos dormem")].into_iter().collect();
        let catalog = IndexBuilder::new(corpus, normalizer()).build().unwrap();
        assert_eq!(catalog.variant_names(), vec!["basic", "no-stopwords", "stemming", "bigrams", "shingles"]);
    }

    #[test]
    fn custom_registry_replaces_default() {
        let corpus: Corpus = [("x", "texto")].into_iter().collect();
        let registry = vec![VariantSpec::new("only", NormalizerConfig::default())];
        let catalog = IndexBuilder::new(corpus, normalizer()).with_registry(registry).build().unwrap();
        assert_eq!(catalog.variant_names(), vec!["only"]);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let result = IndexBuilder::new(Corpus::new(), normalizer()).build();
        assert!(matches!(result, Err(Error::Corpus(_))));
    }
}
