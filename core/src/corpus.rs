use crate::error::{Error, Result};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").expect("valid selector");
}

const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];

/// Document id → raw document bytes. Text is kept undecoded so that a document which is not
/// valid UTF-8 fails on its own during a build instead of failing the whole load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    docs: BTreeMap<String, Vec<u8>>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    /// Inserts a document, replacing any previous text under the same id.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<Vec<u8>>) {
        self.docs.insert(id.into(), text.into());
    }

    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.docs.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    /// Documents in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.docs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Corpus {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for (k, v) in iter {
            corpus.insert(k, v);
        }
        corpus
    }
}

/// Anything that can hand over a fully materialized corpus.
pub trait CorpusSource {
    fn load(&self) -> Result<Corpus>;
}

impl CorpusSource for Corpus {
    fn load(&self) -> Result<Corpus> {
        Ok(self.clone())
    }
}

/// Corpus stored as a JSON object, either flat (`{"id": "text"}`) or nested the way the
/// HTML mapper writes it (`{"ipea": {"date=...": {"dir": {"file.html": {"path": .., "content": ..}}}}}`).
///
/// Ids are the `/`-joined key path below `root_key`.
pub struct JsonCorpus {
    pub path: PathBuf,
    pub root_key: Option<String>,
}

impl JsonCorpus {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), root_key: None }
    }

    pub fn with_root_key(mut self, key: impl Into<String>) -> Self {
        self.root_key = Some(key.into());
        self
    }

    /// Builds a corpus from an already parsed JSON value.
    pub fn parse_value(&self, json: &Value) -> Result<Corpus> {
        let mut node = json;
        if let Some(key) = &self.root_key {
            node = json
                .get(key)
                .ok_or_else(|| Error::Corpus(format!("root key {key:?} not found in {}", self.path.display())))?;
        }
        let Value::Object(map) = node else {
            return Err(Error::Corpus(format!("{} is not a JSON object", self.path.display())));
        };
        let mut corpus = Corpus::new();
        for (key, value) in map {
            collect(key.clone(), value, &mut corpus);
        }
        Ok(corpus)
    }
}

fn collect(id: String, value: &Value, corpus: &mut Corpus) {
    match value {
        Value::String(text) => corpus.insert(id, text.as_str()),
        Value::Object(map) => match map.get("content") {
            Some(Value::String(text)) => corpus.insert(id, text.as_str()),
            Some(_) => tracing::warn!(doc = %id, "content is not a string, skipping"),
            None if map.get("path").map_or(false, Value::is_string) => {
                tracing::warn!(doc = %id, "no extracted content, skipping")
            }
            None => {
                for (key, child) in map {
                    collect(format!("{id}/{key}"), child, corpus);
                }
            }
        },
        _ => tracing::warn!(doc = %id, "unexpected JSON value, skipping"),
    }
}

impl CorpusSource for JsonCorpus {
    fn load(&self) -> Result<Corpus> {
        let raw = fs::read(&self.path)?;
        let json: Value = serde_json::from_slice(&raw)
            .map_err(|e| Error::Corpus(format!("{}: {e}", self.path.display())))?;
        let corpus = self.parse_value(&json)?;
        tracing::info!(path = %self.path.display(), num_docs = corpus.len(), "loaded corpus");
        Ok(corpus)
    }
}

/// Corpus made of the text files under a directory. Ids are paths relative to the root.
///
/// HTML files contribute only the visible text of their `<body>`. Files that are not valid
/// UTF-8 are kept as raw bytes.
pub struct DirCorpus {
    pub root: PathBuf,
    pub extensions: Vec<String>,
}

impl DirCorpus {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: vec!["txt".into(), "html".into(), "htm".into()],
        }
    }
}

impl CorpusSource for DirCorpus {
    fn load(&self) -> Result<Corpus> {
        if !self.root.is_dir() {
            return Err(Error::Corpus(format!("{} is not a directory", self.root.display())));
        }
        let mut corpus = Corpus::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if !p.is_file() {
                continue;
            }
            let Some(ext) = p.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                continue;
            }
            let rel = p.strip_prefix(&self.root).unwrap_or(p);
            let id = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            let raw = fs::read(p)?;
            let is_markup = MARKUP_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext));
            match std::str::from_utf8(&raw) {
                Ok(html) if is_markup => corpus.insert(id, markup_text(html)),
                _ => corpus.insert(id, raw),
            }
        }
        tracing::info!(root = %self.root.display(), num_docs = corpus.len(), "loaded corpus");
        Ok(corpus)
    }
}

/// Visible text of an HTML document, one space between text nodes.
fn markup_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = doc.select(&BODY).next().unwrap_or_else(|| doc.root_element());
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element())
            .map_or(false, |e| matches!(e.name(), "script" | "style"));
        if hidden {
            continue;
        }
        let text = text.trim();
        if !text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn nested_json_uses_key_paths() {
        let json = json!({
            "ipea": {
                "date=2024-01-01": {
                    "atas": {
                        "a.html": {"path": "atas/a.html", "content": "primeiro texto"},
                        "b.html": {"path": "atas/b.html"}
                    }
                }
            }
        });
        let corpus = JsonCorpus::new("mem.json").with_root_key("ipea").parse_value(&json).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.get("date=2024-01-01/atas/a.html"), Some("primeiro texto".as_bytes()));
    }

    #[test]
    fn flat_json_and_missing_root() {
        let json = json!({"a": "the cat sat", "b": "the dog sat", "n": 3});
        let corpus = JsonCorpus::new("mem.json").parse_value(&json).unwrap();
        let ids: Vec<&str> = corpus.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(JsonCorpus::new("mem.json").with_root_key("ipea").parse_value(&json).is_err());
        assert!(JsonCorpus::new("mem.json").parse_value(&json!(["x"])).is_err());
    }

    #[test]
    fn directory_keeps_raw_bytes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("one.txt"), "hello").unwrap();
        fs::write(dir.path().join("sub/two.html"), [0xffu8, 0xfe]).unwrap();
        fs::write(dir.path().join("skip.pdf"), "nope").unwrap();
        let corpus = DirCorpus::new(dir.path()).load().unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("sub/two.html"), Some(&[0xffu8, 0xfe][..]));
    }

    #[test]
    fn html_files_contribute_body_text_only() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("page.html"),
            r#"<html><head><title>ignored</title><style>p { color: red }</style></head><body><div class="main">cat</div><script>var x = 1;</script><p>sat</p></body></html>"#,
        )
        .unwrap();
        fs::write(dir.path().join("plain.txt"), "<b>kept as written</b>").unwrap();
        let corpus = DirCorpus::new(dir.path()).load().unwrap();
        assert_eq!(corpus.get("page.html"), Some("cat sat".as_bytes()));
        assert_eq!(corpus.get("plain.txt"), Some("<b>kept as written</b>".as_bytes()));
    }
}
