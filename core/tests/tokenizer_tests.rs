use lexvar_core::tokenizer::{Language, LanguageResources, NormalizerConfig, TextNormalizer};

fn normalizer(language: Language) -> TextNormalizer {
    TextNormalizer::new(LanguageResources::embedded(language).unwrap())
}

#[test]
fn it_normalizes_and_stems() {
    let words = normalizer(Language::English).normalize("Running Runners RUN! The café's menu.", &NormalizerConfig::default());
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization: café -> cafe
    assert!(words.contains(&"cafe".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let cfg = NormalizerConfig { apply_stemming: false, ..Default::default() };
    let words = normalizer(Language::English).normalize("The quick brown fox and the lazy dog", &cfg);
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn it_folds_portuguese_text() {
    let cfg = NormalizerConfig { apply_stemming: false, ..Default::default() };
    let words = normalizer(Language::Portuguese).normalize("Relatório de Conjuntura nº 42: inflação e câmbio", &cfg);
    assert_eq!(words, vec!["relatorio", "conjuntura", "inflacao", "cambio"]);
}

#[test]
fn it_is_deterministic() {
    let n = normalizer(Language::Portuguese);
    let cfg = NormalizerConfig { emit_shingles: true, ..Default::default() };
    let text = "As políticas públicas de emprego e renda nas regiões metropolitanas";
    let first = n.normalize(text, &cfg);
    for _ in 0..5 {
        assert_eq!(n.normalize(text, &cfg), first);
    }
}

#[test]
fn bigrams_over_short_documents() {
    let n = normalizer(Language::English);
    let cfg = NormalizerConfig { apply_stemming: false, emit_ngrams: true, ngram_size: 2, ..Default::default() };
    assert_eq!(n.normalize("cat sat", &cfg), vec!["cat sat"]);
    assert!(n.normalize("cat", &cfg).is_empty());
    assert!(n.normalize("", &cfg).is_empty());
}

#[test]
fn english_contractions_leave_no_fragments() {
    let cfg = NormalizerConfig { apply_stemming: false, ..Default::default() };
    let words = normalizer(Language::English).normalize("We won't stop, they'd said; don't you see it's late", &cfg);
    assert_eq!(words, vec!["stop", "said", "see", "late"]);
}
