use crate::catalog::{SkippedDocument, VariantStats};
use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::tokenizer::{Language, NormalizerConfig};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Leading bytes of every persisted index file.
const INDEX_MAGIC: &[u8; 4] = b"LXVI";
pub const INDEX_FORMAT_VERSION: u32 = 1;
pub const MANIFEST_VERSION: u32 = 1;

/// `catalog.json`: what was built, with which configuration, and how it measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub version: u32,
    pub created_at: String,
    pub language: Language,
    pub variants: Vec<VariantRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub name: String,
    pub config: NormalizerConfig,
    pub stats: VariantStats,
    #[serde(default)]
    pub skipped: Vec<SkippedDocument>,
}

/// File layout of a saved catalog directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn manifest(&self) -> PathBuf { self.root.join("catalog.json") }
    pub fn variant(&self, name: &str) -> PathBuf { self.root.join(format!("{name}.idx")) }
}

/// Writes `bytes` to a sibling temp file and renames it over `path`, so readers only ever see
/// the previous file or the complete new one.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Size in bytes of the bincode payload [`save_index`] would write.
pub fn serialized_size(index: &InvertedIndex) -> u64 {
    bincode::serialized_size(index).unwrap_or(0)
}

/// Layout: `[magic "LXVI"][u32 version BE][bincode payload][u32 CRC32 BE of payload]`.
pub fn save_index(index: &InvertedIndex, path: &Path) -> Result<()> {
    let payload = bincode::serialize(index).map_err(|e| Error::unavailable(path, e))?;
    let crc = crc32fast::hash(&payload);
    let mut out = Vec::with_capacity(payload.len() + 12);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&crc.to_be_bytes());
    write_atomic(path, &out)?;
    tracing::debug!(path = %path.display(), bytes = out.len(), crc = %format!("{crc:#010x}"), "saved index");
    Ok(())
}

/// Reads and verifies an index written by [`save_index`]. Anything short of a fully valid
/// file is [`Error::IndexUnavailable`].
pub fn load_index(path: &Path) -> Result<InvertedIndex> {
    let raw = fs::read(path).map_err(|e| Error::unavailable(path, e))?;
    if raw.len() < 12 {
        return Err(Error::unavailable(path, "file too short"));
    }
    if &raw[..4] != INDEX_MAGIC {
        return Err(Error::unavailable(path, "not an index file"));
    }
    let version = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(Error::unavailable(path, format!("unsupported format version {version}")));
    }
    let (payload, footer) = raw[8..].split_at(raw.len() - 12);
    let stored = u32::from_be_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(Error::unavailable(
            path,
            format!("checksum mismatch: expected {stored:#010x}, got {computed:#010x}"),
        ));
    }
    let mut index: InvertedIndex = bincode::deserialize(payload).map_err(|e| Error::unavailable(path, e))?;
    index.rebuild_lookups();
    index.validate().map_err(|e| Error::unavailable(path, e))?;
    Ok(index)
}

impl InvertedIndex {
    pub fn save_index<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_index(self, path.as_ref())
    }

    /// Replaces this index with the one stored at `path`. On error `self` is unchanged.
    pub fn load_index<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = load_index(path.as_ref())?;
        Ok(())
    }
}

pub fn save_manifest(paths: &IndexPaths, manifest: &CatalogManifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest).map_err(|e| Error::unavailable(paths.manifest(), e))?;
    write_atomic(&paths.manifest(), &json)
}

pub fn load_manifest(paths: &IndexPaths) -> Result<CatalogManifest> {
    let path = paths.manifest();
    let raw = fs::read(&path).map_err(|e| Error::unavailable(&path, e))?;
    let manifest: CatalogManifest = serde_json::from_slice(&raw).map_err(|e| Error::unavailable(&path, e))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(Error::unavailable(&path, format!("unsupported manifest version {}", manifest.version)));
    }
    Ok(manifest)
}

fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let mut name = dir
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("{} does not name a directory", dir.display())))?
        .to_os_string();
    name.push(suffix);
    Ok(dir.with_file_name(name))
}

/// Creates an empty `<dir>.staging` sibling to write a whole catalog into before
/// [`publish_staged`] swaps it in. `dir` is created if needed and returned canonicalized.
pub fn prepare_staging(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let dir = fs::canonicalize(dir)?;
    let has_entries = fs::read_dir(&dir)?.next().is_some();
    if has_entries && !IndexPaths::new(&dir).manifest().exists() {
        return Err(Error::InvalidConfig(format!(
            "{} is not empty and holds no catalog, refusing to replace it",
            dir.display()
        )));
    }
    let staging = sibling(&dir, ".staging")?;
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir(&staging)?;
    Ok((dir, staging))
}

/// Replaces `dir` with the fully written `staging` directory. Readers see the previous catalog
/// or the new one, never a mix; files of the previous catalog do not survive.
pub fn publish_staged(staging: &Path, dir: &Path) -> Result<()> {
    let old = sibling(dir, ".old")?;
    if old.exists() {
        fs::remove_dir_all(&old)?;
    }
    fs::rename(dir, &old)?;
    if let Err(e) = fs::rename(staging, dir) {
        let _ = fs::rename(&old, dir);
        let _ = fs::remove_dir_all(staging);
        return Err(e.into());
    }
    fs::remove_dir_all(&old)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document("a", &["cat".to_string(), "sat".to_string()]).unwrap();
        idx.add_document("b", &["dog".to_string(), "sat".to_string(), "sat".to_string()]).unwrap();
        idx
    }

    #[test]
    fn round_trips_full_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.idx");
        let idx = sample();
        idx.save_index(&path).unwrap();
        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded, idx);
        assert_eq!(loaded.term_frequency("sat", "b"), 2);
        assert_eq!(loaded.document_frequency("sat"), 2);
        assert!(!dir.path().join("v.idx.tmp").exists());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let err = load_index(&dir.path().join("nope.idx")).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable { .. }));
    }

    #[test]
    fn flipped_byte_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.idx");
        sample().save_index(&path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xff;
        fs::write(&path, &raw).unwrap();
        assert!(matches!(load_index(&path), Err(Error::IndexUnavailable { .. })));
    }

    #[test]
    fn truncated_file_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.idx");
        sample().save_index(&path).unwrap();
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() - 5]).unwrap();

        let mut target = InvertedIndex::new();
        target.add_document("keep", &["me".to_string()]).unwrap();
        let before = target.clone();
        assert!(target.load_index(&path).is_err());
        assert_eq!(target, before);
    }

    #[test]
    fn staging_refuses_foreign_directories() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("notes.txt"), "mine").unwrap();
        assert!(matches!(prepare_staging(&target), Err(Error::InvalidConfig(_))));
        assert!(target.join("notes.txt").exists());
        assert!(!dir.path().join("out.staging").exists());
    }

    #[test]
    fn publish_swaps_whole_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        let (target, staging) = prepare_staging(&target).unwrap();
        fs::write(staging.join("catalog.json"), "{}").unwrap();
        fs::write(target.join("stale.idx"), "old").unwrap();
        publish_staged(&staging, &target).unwrap();
        assert!(target.join("catalog.json").exists());
        assert!(!target.join("stale.idx").exists());
        assert!(!staging.exists());
        assert!(!dir.path().join("out.old").exists());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.idx");
        sample().save_index(&path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        raw[7] = 99;
        fs::write(&path, &raw).unwrap();
        let err = load_index(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
