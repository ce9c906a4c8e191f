use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]|\d").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

const PORTUGUESE_STOPWORDS: &[&str] = &[
    "a","à","ao","aos","aquela","aquelas","aquele","aqueles","aquilo","as","às","até",
    "com","como","da","das","de","dela","delas","dele","deles","depois","do","dos",
    "e","é","ela","elas","ele","eles","em","entre","era","eram","éramos","essa","essas","esse","esses",
    "esta","está","estamos","estão","estar","estas","estava","estavam","estávamos","este","esteja","estejam",
    "estejamos","estes","esteve","estive","estivemos","estiver","estivera","estiveram","estivéramos",
    "estiverem","estivermos","estivesse","estivessem","estivéssemos","estou","eu",
    "foi","fomos","for","fora","foram","fôramos","forem","formos","fosse","fossem","fôssemos","fui",
    "há","haja","hajam","hajamos","hão","havemos","haver","hei","houve","houvemos","houver","houvera",
    "houverá","houveram","houvéramos","houverão","houverei","houverem","houveremos","houveria","houveriam",
    "houveríamos","houvermos","houvesse","houvessem","houvéssemos",
    "isso","isto","já","lhe","lhes","mais","mas","me","mesmo","meu","meus","minha","minhas","muito",
    "na","não","nas","nem","no","nos","nós","nossa","nossas","nosso","nossos","num","numa",
    "o","os","ou","para","pela","pelas","pelo","pelos","por","qual","quando","que","quem",
    "são","se","seja","sejam","sejamos","sem","ser","será","serão","serei","seremos","seria","seriam",
    "seríamos","seu","seus","só","somos","sou","sua","suas",
    "também","te","tem","tém","temos","tenha","tenham","tenhamos","tenho","terá","terão","terei",
    "teremos","teria","teriam","teríamos","teu","teus","teve","tinha","tinham","tínhamos","tive",
    "tivemos","tiver","tivera","tiveram","tivéramos","tiverem","tivermos","tivesse","tivessem",
    "tivéssemos","tu","tua","tuas","um","uma","você","vocês","vos",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
];

/// Target language of a deployment. Selects the embedded stopword list and the stemmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Portuguese,
    English,
}

impl Language {
    fn algorithm(self) -> Algorithm {
        match self {
            Language::Portuguese => Algorithm::Portuguese,
            Language::English => Algorithm::English,
        }
    }

    fn stopwords(self) -> &'static [&'static str] {
        match self {
            Language::Portuguese => PORTUGUESE_STOPWORDS,
            Language::English => ENGLISH_STOPWORDS,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Portuguese => f.write_str("portuguese"),
            Language::English => f.write_str("english"),
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "portuguese" | "pt" => Ok(Language::Portuguese),
            "english" | "en" => Ok(Language::English),
            other => Err(Error::InvalidConfig(format!("unsupported language {other:?}"))),
        }
    }
}

/// Options recognized by [`TextNormalizer::normalize`].
///
/// | option              | default |
/// |---------------------|---------|
/// | `remove_stopwords`  | `true`  |
/// | `apply_stemming`    | `true`  |
/// | `emit_ngrams`       | `false` |
/// | `ngram_size`        | `2`     |
/// | `emit_shingles`     | `false` |
/// | `max_shingle_size`  | `3`     |
///
/// `emit_shingles` supersedes `emit_ngrams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub remove_stopwords: bool,
    pub apply_stemming: bool,
    pub emit_ngrams: bool,
    pub ngram_size: usize,
    pub emit_shingles: bool,
    pub max_shingle_size: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            remove_stopwords: true,
            apply_stemming: true,
            emit_ngrams: false,
            ngram_size: 2,
            emit_shingles: false,
            max_shingle_size: 3,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.emit_ngrams && self.ngram_size == 0 {
            return Err(Error::InvalidConfig("ngram_size must be at least 1".into()));
        }
        if self.emit_shingles && self.max_shingle_size == 0 {
            return Err(Error::InvalidConfig("max_shingle_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Stopword set and stemmer for one language, loaded once and shared by every variant.
pub struct LanguageResources {
    language: Language,
    stopwords: HashSet<String>,
    stemmer: Stemmer,
}

impl fmt::Debug for LanguageResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageResources")
            .field("language", &self.language)
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

impl LanguageResources {
    /// Resources built from the stopword list compiled into the crate.
    pub fn embedded(language: Language) -> Result<Self> {
        Self::from_words(language, language.stopwords().iter().copied(), "embedded stopword list")
    }

    /// Resources whose stopword list is read from `path`, one word per line. Lines starting
    /// with `#` are comments.
    pub fn with_stopword_file<P: AsRef<Path>>(language: Language, path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::ResourceLoad {
            resource: format!("stopword list {}", path.display()),
            reason: e.to_string(),
        })?;
        let words = raw.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));
        Self::from_words(language, words, &format!("stopword list {}", path.display()))
    }

    fn from_words<'a>(language: Language, words: impl Iterator<Item = &'a str>, source: &str) -> Result<Self> {
        // Stopwords go through the same folding as document text, otherwise accented entries
        // ("não") could never match a folded token ("nao"). Folding turns a contraction into
        // several words ("don't" -> "don t"), and each of them is a stopword on its own.
        let stopwords: HashSet<String> = words
            .flat_map(|w| fold_text(w).split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .collect();
        if stopwords.is_empty() {
            return Err(Error::ResourceLoad { resource: source.to_string(), reason: "no stopwords found".into() });
        }
        Ok(Self { language, stopwords, stemmer: Stemmer::create(language.algorithm()) })
    }

    pub fn language(&self) -> Language { self.language }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token) || self.stopwords.contains(&token.to_lowercase())
    }

    pub fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token).into_owned()
    }
}

/// Lowercase, drop combining marks after NFKD decomposition, replace non-word characters and
/// digits with spaces, then collapse whitespace.
pub fn fold_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let folded: String = lowered.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let cleaned = NON_WORD.replace_all(&folded, " ");
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// Sliding windows of `n` consecutive tokens joined by a single space. Fewer than `n` tokens
/// yield nothing.
pub fn ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Every n-gram for n in `1..=max_n`, shortest first.
pub fn shingles(tokens: &[String], max_n: usize) -> Vec<String> {
    (1..=max_n).flat_map(|n| ngrams(tokens, n)).collect()
}

/// Turns raw text into index terms. Deterministic for fixed resources and configuration.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    resources: Arc<LanguageResources>,
}

impl TextNormalizer {
    pub fn new(resources: LanguageResources) -> Self {
        Self { resources: Arc::new(resources) }
    }

    pub fn language(&self) -> Language { self.resources.language() }

    /// Folded, tokenized, stopword-filtered and stemmed tokens, before any n-gram expansion.
    pub fn tokens(&self, text: &str, config: &NormalizerConfig) -> Vec<String> {
        let folded = fold_text(text);
        folded
            .unicode_words()
            .filter(|t| !(config.remove_stopwords && self.resources.is_stopword(t)))
            .map(|t| if config.apply_stemming { self.resources.stem(t) } else { t.to_string() })
            .collect()
    }

    /// The term stream indexed for `config`: shingles, n-grams or plain tokens.
    pub fn normalize(&self, text: &str, config: &NormalizerConfig) -> Vec<String> {
        let tokens = self.tokens(text, config);
        if config.emit_shingles {
            shingles(&tokens, config.max_shingle_size)
        } else if config.emit_ngrams {
            ngrams(&tokens, config.ngram_size)
        } else {
            tokens
        }
    }

    /// Like [`normalize`](Self::normalize) for raw document bytes, which must be UTF-8.
    pub fn normalize_bytes(&self, doc_id: &str, raw: &[u8], config: &NormalizerConfig) -> Result<Vec<String>> {
        let text = std::str::from_utf8(raw).map_err(|e| Error::MalformedText {
            doc_id: doc_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.normalize(text, config))
    }
}
