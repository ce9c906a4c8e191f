use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    /// Number of terms indexed for the document.
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub count: u32,
}

/// Snapshot of an index's size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: u32,
    pub vocabulary_size: usize,
    pub mean_terms_per_document: f64,
    pub postings_count: usize,
}

/// Term → postings index for one normalization variant.
///
/// Terms and documents are interned: `terms[t]` and `postings[t]` describe term id `t`,
/// `docs[d]` describes doc id `d`. Doc ids are handed out in insertion order, so every posting
/// list is sorted by doc id. Term frequency for `(doc, term)` is the `count` of that doc's posting.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub(crate) terms: Vec<String>,
    pub(crate) df: Vec<u32>,
    pub(crate) postings: Vec<Vec<Posting>>, // postings sorted by doc_id
    pub(crate) docs: Vec<DocMeta>,
    pub(crate) num_docs: u32,
    #[serde(skip)]
    pub(crate) dictionary: HashMap<String, TermId>,
    #[serde(skip)]
    pub(crate) doc_id_map: HashMap<String, DocId>,
}

impl PartialEq for InvertedIndex {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
            && self.df == other.df
            && self.postings == other.postings
            && self.docs == other.docs
            && self.num_docs == other.num_docs
    }
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Adds one document's term sequence.
    ///
    /// Each id may be added once per index; adding it again is rejected with
    /// [`Error::DuplicateDocument`] and leaves the index untouched.
    pub fn add_document(&mut self, id: &str, terms: &[String]) -> Result<DocId> {
        if self.doc_id_map.contains_key(id) {
            return Err(Error::DuplicateDocument(id.to_string()));
        }
        let doc_id = self.num_docs;
        self.num_docs += 1;
        self.doc_id_map.insert(id.to_string(), doc_id);
        self.docs.push(DocMeta { external_id: id.to_string(), length: terms.len() as u32 });

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for term in terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        for (term, count) in counts {
            let tid = self.intern(term);
            self.postings[tid as usize].push(Posting { doc_id, count });
            self.df[tid as usize] += 1;
        }
        Ok(doc_id)
    }

    fn intern(&mut self, term: &str) -> TermId {
        if let Some(&tid) = self.dictionary.get(term) {
            return tid;
        }
        let tid = self.terms.len() as TermId;
        self.terms.push(term.to_string());
        self.df.push(0);
        self.postings.push(Vec::new());
        self.dictionary.insert(term.to_string(), tid);
        tid
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        match self.dictionary.get(term) {
            Some(&tid) => &self.postings[tid as usize],
            None => &[],
        }
    }

    pub fn term_frequency(&self, term: &str, doc: &str) -> u32 {
        let Some(&doc_id) = self.doc_id_map.get(doc) else { return 0 };
        self.term_frequency_by_id(term, doc_id)
    }

    fn term_frequency_by_id(&self, term: &str, doc_id: DocId) -> u32 {
        let plist = self.postings(term);
        match plist.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(i) => plist[i].count,
            Err(_) => 0,
        }
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.dictionary.get(term).map(|&tid| self.df[tid as usize]).unwrap_or(0)
    }

    /// `log10(N / (1 + df))`. Negative for terms present in every document; 0 for an empty index.
    pub fn idf(&self, term: &str) -> f64 {
        if self.num_docs == 0 {
            return 0.0;
        }
        (self.num_docs as f64 / (1.0 + self.document_frequency(term) as f64)).log10()
    }

    pub fn tfidf(&self, term: &str, doc: &str) -> f64 {
        self.term_frequency(term, doc) as f64 * self.idf(term)
    }

    /// Documents containing every query term, sorted by document id. Empty for an empty query.
    pub fn search(&self, query_terms: &[String]) -> Vec<String> {
        let Some((first, rest)) = query_terms.split_first() else { return Vec::new() };
        let mut hits: Vec<DocId> = self.postings(first).iter().map(|p| p.doc_id).collect();
        for term in rest {
            if hits.is_empty() {
                break;
            }
            let plist = self.postings(term);
            hits.retain(|d| plist.binary_search_by_key(d, |p| p.doc_id).is_ok());
        }
        let mut out: Vec<String> = hits.into_iter().map(|d| self.docs[d as usize].external_id.clone()).collect();
        out.sort();
        out
    }

    /// Documents matching any query term, scored by the sum of `tfidf(term, doc)` over the query
    /// terms (repeated terms count again). Sorted by score descending, then document id ascending.
    pub fn rank_search(&self, query_terms: &[String]) -> Vec<(String, f64)> {
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        for term in query_terms {
            let idf = self.idf(term);
            for p in self.postings(term) {
                *scores.entry(p.doc_id).or_insert(0.0) += p.count as f64 * idf;
            }
        }
        let mut scored: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(d, s)| (self.docs[d as usize].external_id.clone(), s))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        scored
    }

    pub fn total_documents(&self) -> u32 { self.num_docs }

    pub fn vocabulary_size(&self) -> usize { self.terms.len() }

    /// Every indexed term, in first-seen order.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn contains_term(&self, term: &str) -> bool { self.dictionary.contains_key(term) }

    pub fn contains_document(&self, doc: &str) -> bool { self.doc_id_map.contains_key(doc) }

    pub fn document_length(&self, doc: &str) -> Option<u32> {
        self.doc_id_map.get(doc).map(|&d| self.docs[d as usize].length)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocMeta> {
        self.docs.iter()
    }

    pub fn stats(&self) -> IndexStats {
        let total_terms: u64 = self.docs.iter().map(|d| d.length as u64).sum();
        IndexStats {
            document_count: self.num_docs,
            vocabulary_size: self.terms.len(),
            mean_terms_per_document: total_terms as f64 / self.num_docs.max(1) as f64,
            postings_count: self.postings.iter().map(Vec::len).sum(),
        }
    }

    /// Rebuilds the lookup maps that are not serialized.
    pub(crate) fn rebuild_lookups(&mut self) {
        self.dictionary = self.terms.iter().enumerate().map(|(i, t)| (t.clone(), i as TermId)).collect();
        self.doc_id_map = self.docs.iter().enumerate().map(|(i, d)| (d.external_id.clone(), i as DocId)).collect();
    }

    /// Checks the structural invariants a freshly deserialized index must satisfy.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.docs.len() != self.num_docs as usize {
            return Err(format!("{} document records for {} documents", self.docs.len(), self.num_docs));
        }
        if self.df.len() != self.terms.len() || self.postings.len() != self.terms.len() {
            return Err("term tables have mismatched lengths".into());
        }
        if self.dictionary.len() != self.terms.len() {
            return Err("duplicate terms in vocabulary".into());
        }
        if self.doc_id_map.len() != self.docs.len() {
            return Err("duplicate document ids".into());
        }
        let mut tf_sums = vec![0u64; self.docs.len()];
        for (tid, plist) in self.postings.iter().enumerate() {
            if plist.len() != self.df[tid] as usize {
                return Err(format!("document frequency mismatch for term {:?}", self.terms[tid]));
            }
            for (i, p) in plist.iter().enumerate() {
                if p.doc_id >= self.num_docs || p.count == 0 {
                    return Err(format!("invalid posting for term {:?}", self.terms[tid]));
                }
                if i > 0 && plist[i - 1].doc_id >= p.doc_id {
                    return Err(format!("unsorted postings for term {:?}", self.terms[tid]));
                }
                tf_sums[p.doc_id as usize] += p.count as u64;
            }
        }
        for (doc, sum) in self.docs.iter().zip(tf_sums) {
            if doc.length as u64 != sum {
                return Err(format!("length mismatch for document {:?}", doc.external_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn cat_dog() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document("a", &terms("cat sat")).unwrap();
        idx.add_document("b", &terms("dog sat")).unwrap();
        idx
    }

    #[test]
    fn frequencies_follow_added_documents() {
        let mut idx = InvertedIndex::new();
        idx.add_document("d1", &terms("x y x z x")).unwrap();
        idx.add_document("d2", &terms("y")).unwrap();
        assert_eq!(idx.term_frequency("x", "d1"), 3);
        assert_eq!(idx.term_frequency("x", "d2"), 0);
        assert_eq!(idx.term_frequency("x", "missing"), 0);
        assert_eq!(idx.document_frequency("y"), 2);
        assert_eq!(idx.document_frequency("nope"), 0);
        assert_eq!(idx.document_length("d1"), Some(5));
        let sum: u32 = ["x", "y", "z"].iter().map(|t| idx.term_frequency(t, "d1")).sum();
        assert_eq!(sum, 5);
        assert!(idx.validate().is_ok());
    }

    #[test]
    fn duplicate_document_is_rejected() {
        let mut idx = cat_dog();
        let before = idx.clone();
        assert!(matches!(idx.add_document("a", &terms("zebra")), Err(Error::DuplicateDocument(_))));
        assert_eq!(idx, before);
        assert_eq!(idx.total_documents(), 2);
    }

    #[test]
    fn idf_is_defined_over_full_df_range() {
        let idx = cat_dog();
        assert!((idx.idf("unseen") - (2.0f64).log10()).abs() < 1e-12);
        assert_eq!(idx.idf("cat"), 0.0);
        assert!(idx.idf("sat") < 0.0);
        assert_eq!(InvertedIndex::new().idf("anything"), 0.0);
    }

    #[test]
    fn boolean_search_intersects() {
        let mut idx = cat_dog();
        idx.add_document("c", &terms("cat sat mat")).unwrap();
        assert_eq!(idx.search(&terms("cat sat")), vec!["a", "c"]);
        assert_eq!(idx.search(&terms("sat")), vec!["a", "b", "c"]);
        assert!(idx.search(&terms("cat unseen")).is_empty());
        assert!(idx.search(&[]).is_empty());
    }

    #[test]
    fn rank_search_sums_tfidf_and_breaks_ties_by_id() {
        let mut idx = InvertedIndex::new();
        idx.add_document("b", &terms("apple")).unwrap();
        idx.add_document("a", &terms("apple")).unwrap();
        idx.add_document("c", &terms("apple apple pear")).unwrap();
        idx.add_document("d", &terms("kiwi")).unwrap();
        idx.add_document("e", &terms("kiwi")).unwrap();
        let ranked = idx.rank_search(&terms("pear"));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "c");
        assert!((ranked[0].1 - idx.tfidf("pear", "c")).abs() < 1e-12);

        let ranked = idx.rank_search(&terms("kiwi"));
        let ids: Vec<&str> = ranked.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(ids, vec!["d", "e"]);

        assert!(idx.rank_search(&[]).is_empty());
        assert!(idx.rank_search(&terms("unseen")).is_empty());
    }

    #[test]
    fn stats_report_sizes() {
        let idx = cat_dog();
        let s = idx.stats();
        assert_eq!(s.document_count, 2);
        assert_eq!(s.vocabulary_size, 3);
        assert_eq!(s.postings_count, 4);
        assert!((s.mean_terms_per_document - 2.0).abs() < 1e-12);
        assert_eq!(InvertedIndex::new().stats().mean_terms_per_document, 0.0);
    }

    #[test]
    fn empty_document_counts_toward_total() {
        let mut idx = InvertedIndex::new();
        idx.add_document("empty", &[]).unwrap();
        assert_eq!(idx.total_documents(), 1);
        assert_eq!(idx.vocabulary_size(), 0);
        assert_eq!(idx.document_length("empty"), Some(0));
    }
}
