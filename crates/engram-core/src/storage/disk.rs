//! Disk tiers
//!
//! File-per-entity storage shared by the warm, cold, and archive levels:
//!
//! ```text
//! <root>/patterns/<id>.<ext>
//! <root>/associations/<src>_<dst>.<ext>
//! ```
//!
//! where `<id>` is the pattern id's canonical hex string. A reader-writer
//! locked in-memory index of present ids backs the `has_*` queries; it is
//! rebuilt from a directory scan at startup so a crash never loses tier
//! contents. Files are opened and closed per operation, and all I/O is
//! synchronous, so `flush` has nothing to do.
//!
//! The archive tier wraps each record in a versioned zlib envelope; the
//! uncompressed payload is byte-identical to the warm and cold records.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tracing::warn;

use crate::association::AssociationEdge;
use crate::error::{EngramError, Result};
use crate::pattern::{PatternId, PatternNode, PatternPair};
use crate::storage::{MemoryTier, TierStore};

/// Envelope version for archive records
const ARCHIVE_ENVELOPE_VERSION: u8 = 1;

/// Fixed zlib level keeps archive output deterministic
const ARCHIVE_COMPRESSION_LEVEL: u32 = 6;

// ============================================================================
// SHARED FILE STORE
// ============================================================================

#[derive(Default)]
struct TierIndex {
    patterns: HashSet<PatternId>,
    associations: HashSet<PatternPair>,
}

/// Byte-level file-per-entity store with an in-memory presence index
struct FileStore {
    patterns_dir: PathBuf,
    associations_dir: PathBuf,
    pattern_ext: &'static str,
    association_ext: &'static str,
    index: RwLock<TierIndex>,
}

impl FileStore {
    fn open(root: &Path, pattern_ext: &'static str, association_ext: &'static str) -> Result<Self> {
        let patterns_dir = root.join("patterns");
        let associations_dir = root.join("associations");
        fs::create_dir_all(&patterns_dir)?;
        fs::create_dir_all(&associations_dir)?;

        let store = Self {
            patterns_dir,
            associations_dir,
            pattern_ext,
            association_ext,
            index: RwLock::new(TierIndex::default()),
        };
        store.rebuild_index();
        Ok(store)
    }

    fn pattern_path(&self, id: PatternId) -> PathBuf {
        self.patterns_dir
            .join(format!("{}.{}", id.to_hex(), self.pattern_ext))
    }

    fn association_path(&self, source: PatternId, target: PatternId) -> PathBuf {
        self.associations_dir.join(format!(
            "{}_{}.{}",
            source.to_hex(),
            target.to_hex(),
            self.association_ext
        ))
    }

    /// Rebuild the presence index from the files on disk. Stems that do
    /// not parse as pattern ids are skipped with a warning.
    fn rebuild_index(&self) {
        let mut index = self.index.write().expect("tier index lock");
        index.patterns.clear();
        index.associations.clear();

        for stem in list_stems(&self.patterns_dir, self.pattern_ext) {
            match PatternId::from_hex(&stem) {
                Some(id) => {
                    index.patterns.insert(id);
                }
                None => warn!(file = %stem, "skipping unparseable pattern file"),
            }
        }

        for stem in list_stems(&self.associations_dir, self.association_ext) {
            let parsed = stem.split_once('_').and_then(|(src, dst)| {
                Some((PatternId::from_hex(src)?, PatternId::from_hex(dst)?))
            });
            match parsed {
                Some(pair) => {
                    index.associations.insert(pair);
                }
                None => warn!(file = %stem, "skipping unparseable association file"),
            }
        }
    }

    fn put_pattern(&self, id: PatternId, bytes: &[u8]) -> Result<()> {
        fs::write(self.pattern_path(id), bytes)?;
        self.index
            .write()
            .expect("tier index lock")
            .patterns
            .insert(id);
        Ok(())
    }

    fn get_pattern(&self, id: PatternId) -> Result<Option<Vec<u8>>> {
        read_optional(&self.pattern_path(id))
    }

    fn delete_pattern(&self, id: PatternId) -> Result<bool> {
        let path = self.pattern_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        self.index
            .write()
            .expect("tier index lock")
            .patterns
            .remove(&id);
        Ok(true)
    }

    fn has_pattern(&self, id: PatternId) -> bool {
        self.index
            .read()
            .expect("tier index lock")
            .patterns
            .contains(&id)
    }

    fn pattern_ids(&self) -> Vec<PatternId> {
        self.index
            .read()
            .expect("tier index lock")
            .patterns
            .iter()
            .copied()
            .collect()
    }

    fn put_association(&self, source: PatternId, target: PatternId, bytes: &[u8]) -> Result<()> {
        fs::write(self.association_path(source, target), bytes)?;
        self.index
            .write()
            .expect("tier index lock")
            .associations
            .insert((source, target));
        Ok(())
    }

    fn get_association(&self, source: PatternId, target: PatternId) -> Result<Option<Vec<u8>>> {
        read_optional(&self.association_path(source, target))
    }

    fn delete_association(&self, source: PatternId, target: PatternId) -> Result<bool> {
        let path = self.association_path(source, target);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        self.index
            .write()
            .expect("tier index lock")
            .associations
            .remove(&(source, target));
        Ok(true)
    }

    fn has_association(&self, source: PatternId, target: PatternId) -> bool {
        self.index
            .read()
            .expect("tier index lock")
            .associations
            .contains(&(source, target))
    }

    fn association_keys(&self) -> Vec<PatternPair> {
        self.index
            .read()
            .expect("tier index lock")
            .associations
            .iter()
            .copied()
            .collect()
    }

    fn pattern_count(&self) -> usize {
        self.index.read().expect("tier index lock").patterns.len()
    }

    fn association_count(&self) -> usize {
        self.index
            .read()
            .expect("tier index lock")
            .associations
            .len()
    }

    fn disk_usage(&self) -> usize {
        dir_usage(&self.patterns_dir) + dir_usage(&self.associations_dir)
    }

    fn clear(&self) {
        remove_files(&self.patterns_dir, self.pattern_ext);
        remove_files(&self.associations_dir, self.association_ext);
        let mut index = self.index.write().expect("tier index lock");
        index.patterns.clear();
        index.associations.clear();
    }
}

/// File stems (without extension) of regular files matching `ext`
fn list_stems(dir: &Path, ext: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(ext))
        .filter_map(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
        })
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn dir_usage(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len() as usize)
        .sum()
}

fn remove_files(dir: &Path, ext: &str) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|x| x.to_str()) == Some(ext) {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove tier file");
            }
        }
    }
}

// ============================================================================
// FILE TIER (WARM / COLD)
// ============================================================================

/// Uncompressed file-per-entity tier, used at the warm and cold levels
///
/// The two levels share one implementation; they differ only in file
/// extensions and in the latency of the device the root sits on.
pub struct FileTier {
    store: FileStore,
    level: MemoryTier,
}

impl FileTier {
    /// Warm tier at `root`: `patterns/<id>.pat`,
    /// `associations/<src>_<dst>.assoc`
    pub fn warm(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: FileStore::open(root.as_ref(), "pat", "assoc")?,
            level: MemoryTier::Warm,
        })
    }

    /// Cold tier at `root`: `patterns/<id>.cold`,
    /// `associations/<src>_<dst>.cold`
    pub fn cold(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: FileStore::open(root.as_ref(), "cold", "cold")?,
            level: MemoryTier::Cold,
        })
    }
}

impl TierStore for FileTier {
    fn store_pattern(&self, pattern: &PatternNode) -> bool {
        let result = pattern
            .encode_to_vec()
            .and_then(|bytes| self.store.put_pattern(pattern.id(), &bytes));
        log_if_failed(result, self.tier_name(), "store pattern")
    }

    fn load_pattern(&self, id: PatternId) -> Option<PatternNode> {
        decode_or_warn(
            self.store.get_pattern(id),
            |bytes| PatternNode::decode(&mut bytes.as_slice()),
            self.tier_name(),
            "load pattern",
        )
    }

    fn remove_pattern(&self, id: PatternId) -> bool {
        self.store.delete_pattern(id).unwrap_or_else(|e| {
            warn!(tier = self.tier_name(), error = %e, "failed to remove pattern");
            false
        })
    }

    fn has_pattern(&self, id: PatternId) -> bool {
        self.store.has_pattern(id)
    }

    fn pattern_ids(&self) -> Vec<PatternId> {
        self.store.pattern_ids()
    }

    fn store_association(&self, edge: &AssociationEdge) -> bool {
        let result = edge
            .encode_to_vec()
            .and_then(|bytes| self.store.put_association(edge.source(), edge.target(), &bytes));
        log_if_failed(result, self.tier_name(), "store association")
    }

    fn load_association(&self, source: PatternId, target: PatternId) -> Option<AssociationEdge> {
        decode_or_warn(
            self.store.get_association(source, target),
            |bytes| AssociationEdge::decode(&mut bytes.as_slice()),
            self.tier_name(),
            "load association",
        )
    }

    fn remove_association(&self, source: PatternId, target: PatternId) -> bool {
        self.store
            .delete_association(source, target)
            .unwrap_or_else(|e| {
                warn!(tier = self.tier_name(), error = %e, "failed to remove association");
                false
            })
    }

    fn has_association(&self, source: PatternId, target: PatternId) -> bool {
        self.store.has_association(source, target)
    }

    fn association_keys(&self) -> Vec<PatternPair> {
        self.store.association_keys()
    }

    fn pattern_count(&self) -> usize {
        self.store.pattern_count()
    }

    fn association_count(&self) -> usize {
        self.store.association_count()
    }

    fn estimate_memory_usage(&self) -> usize {
        self.store.disk_usage()
    }

    fn tier_level(&self) -> MemoryTier {
        self.level
    }

    fn compact(&self) {
        // One file per entity leaves nothing to defragment
    }

    fn clear(&self) {
        self.store.clear();
    }
}

// ============================================================================
// ARCHIVE TIER
// ============================================================================

/// Compressed file-per-entity tier: `patterns/<id>.arc`,
/// `associations/<src>_<dst>.arc`
///
/// Compression is an invisible wrapper around the warm/cold record format:
/// serialize, compress, write on the way in; read, decompress, deserialize
/// on the way out. Lookups and filenames are unchanged.
pub struct ArchiveTier {
    store: FileStore,
}

impl ArchiveTier {
    /// Archive tier at `root`
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: FileStore::open(root.as_ref(), "arc", "arc")?,
        })
    }

    fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(bytes.len() / 2 + 16);
        out.push(ARCHIVE_ENVELOPE_VERSION);
        let mut encoder = ZlibEncoder::new(out, Compression::new(ARCHIVE_COMPRESSION_LEVEL));
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }

    fn decompress(envelope: &[u8]) -> Result<Vec<u8>> {
        let (version, compressed) = envelope
            .split_first()
            .ok_or_else(|| EngramError::Corruption("empty archive envelope".into()))?;
        if *version != ARCHIVE_ENVELOPE_VERSION {
            return Err(EngramError::Corruption(format!(
                "unknown archive envelope version {version}"
            )));
        }
        let mut bytes = Vec::new();
        ZlibDecoder::new(compressed).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl TierStore for ArchiveTier {
    fn store_pattern(&self, pattern: &PatternNode) -> bool {
        let result = pattern
            .encode_to_vec()
            .and_then(|bytes| Self::compress(&bytes))
            .and_then(|envelope| self.store.put_pattern(pattern.id(), &envelope));
        log_if_failed(result, self.tier_name(), "store pattern")
    }

    fn load_pattern(&self, id: PatternId) -> Option<PatternNode> {
        decode_or_warn(
            self.store.get_pattern(id),
            |envelope| {
                let bytes = Self::decompress(&envelope)?;
                PatternNode::decode(&mut bytes.as_slice())
            },
            self.tier_name(),
            "load pattern",
        )
    }

    fn remove_pattern(&self, id: PatternId) -> bool {
        self.store.delete_pattern(id).unwrap_or_else(|e| {
            warn!(tier = self.tier_name(), error = %e, "failed to remove pattern");
            false
        })
    }

    fn has_pattern(&self, id: PatternId) -> bool {
        self.store.has_pattern(id)
    }

    fn pattern_ids(&self) -> Vec<PatternId> {
        self.store.pattern_ids()
    }

    fn store_association(&self, edge: &AssociationEdge) -> bool {
        let result = edge
            .encode_to_vec()
            .and_then(|bytes| Self::compress(&bytes))
            .and_then(|envelope| {
                self.store
                    .put_association(edge.source(), edge.target(), &envelope)
            });
        log_if_failed(result, self.tier_name(), "store association")
    }

    fn load_association(&self, source: PatternId, target: PatternId) -> Option<AssociationEdge> {
        decode_or_warn(
            self.store.get_association(source, target),
            |envelope| {
                let bytes = Self::decompress(&envelope)?;
                AssociationEdge::decode(&mut bytes.as_slice())
            },
            self.tier_name(),
            "load association",
        )
    }

    fn remove_association(&self, source: PatternId, target: PatternId) -> bool {
        self.store
            .delete_association(source, target)
            .unwrap_or_else(|e| {
                warn!(tier = self.tier_name(), error = %e, "failed to remove association");
                false
            })
    }

    fn has_association(&self, source: PatternId, target: PatternId) -> bool {
        self.store.has_association(source, target)
    }

    fn association_keys(&self) -> Vec<PatternPair> {
        self.store.association_keys()
    }

    fn pattern_count(&self) -> usize {
        self.store.pattern_count()
    }

    fn association_count(&self) -> usize {
        self.store.association_count()
    }

    fn estimate_memory_usage(&self) -> usize {
        self.store.disk_usage()
    }

    fn tier_level(&self) -> MemoryTier {
        MemoryTier::Archive
    }

    fn compact(&self) {
        // Envelopes are already compressed individually
    }

    fn clear(&self) {
        self.store.clear();
    }
}

// ============================================================================
// BOUNDARY HELPERS
// ============================================================================

fn log_if_failed(result: Result<()>, tier: &str, op: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(tier, error = %e, "failed to {op}");
            false
        }
    }
}

fn decode_or_warn<T, F>(read: Result<Option<Vec<u8>>>, decode: F, tier: &str, op: &str) -> Option<T>
where
    F: FnOnce(Vec<u8>) -> Result<T>,
{
    match read {
        Ok(Some(bytes)) => match decode(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(tier, error = %e, "corrupt record during {op}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(tier, error = %e, "failed to {op}");
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
