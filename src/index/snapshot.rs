//! Immutable in-memory state of a [`StorageIndex`](super::storage_index::StorageIndex).
//!
//! A snapshot is an inverted index (`Term` -> ascending document ids) plus
//! the stored fields of every document and a deletion bitmap. Writers clone
//! the published snapshot, apply a batch and swap the result in, so readers
//! always see a complete batch or none of it.
//!
//! On storage a snapshot is a fixed header followed by a bincode payload:
//!
//! ```text
//! magic "LCNX" | version u32 | payload length u64 | crc32 u32 | payload
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;

use bit_vec::BitVec;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::document::document::Document;
use crate::document::field::FieldIndex;
use crate::error::{LucernaError, Result};
use crate::index::check_cancelled;
use crate::query::query::Query;
use crate::query::term::Term;

/// File magic.
pub const MAGIC: &[u8; 4] = b"LCNX";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 4 + 4 + 8 + 4;

/// Fixed header of a persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version.
    pub version: u32,
    /// Length of the payload following the header.
    pub payload_len: u64,
    /// CRC32 of the payload.
    pub checksum: u32,
}

impl SnapshotHeader {
    /// Parse a header. Fails with a corruption error on bad magic or an
    /// unknown version.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| LucernaError::corrupted("truncated header"))?;
        if &magic != MAGIC {
            return Err(LucernaError::corrupted("bad magic"));
        }

        let version = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| LucernaError::corrupted("truncated header"))?;
        if version != FORMAT_VERSION {
            return Err(LucernaError::corrupted(format!(
                "unsupported format version {version}"
            )));
        }
        let payload_len = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| LucernaError::corrupted("truncated header"))?;
        let checksum = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| LucernaError::corrupted("truncated header"))?;

        Ok(SnapshotHeader {
            version,
            payload_len,
            checksum,
        })
    }

    /// Total file size this header announces.
    pub fn file_len(&self) -> u64 {
        HEADER_LEN as u64 + self.payload_len
    }
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    docs: &'a [Document],
    deleted: Vec<u8>,
    postings: &'a BTreeMap<Term, Vec<u32>>,
}

#[derive(Deserialize)]
struct Payload {
    docs: Vec<Document>,
    deleted: Vec<u8>,
    postings: BTreeMap<Term, Vec<u32>>,
}

/// Inverted index state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    docs: Vec<Document>,
    deleted: BitVec,
    postings: BTreeMap<Term, Vec<u32>>,
    live: usize,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Number of live documents.
    pub fn live_docs(&self) -> usize {
        self.live
    }

    /// Number of document slots, deleted ones included.
    pub fn max_doc(&self) -> usize {
        self.docs.len()
    }

    /// Number of distinct terms, including terms of deleted documents.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    fn is_live(&self, doc_id: u32) -> bool {
        !self.deleted.get(doc_id as usize).unwrap_or(true)
    }

    /// Stored fields of a live document.
    pub fn document(&self, doc_id: u32) -> Option<&Document> {
        if self.is_live(doc_id) {
            self.docs.get(doc_id as usize)
        } else {
            None
        }
    }

    /// Index `doc` and append it.
    pub fn add_document(&mut self, doc: &Document, analyzer: &dyn Analyzer) -> Result<u32> {
        let doc_id = u32::try_from(self.docs.len())
            .map_err(|_| LucernaError::invalid_operation("too many documents"))?;

        for field in doc.fields() {
            let terms = match field.index {
                FieldIndex::No => continue,
                FieldIndex::NotAnalyzed => vec![field.value.clone()],
                FieldIndex::Analyzed => analyzer.analyze(&field.value)?,
            };

            for text in terms {
                let ids = self
                    .postings
                    .entry(Term::new(field.name.as_str(), text))
                    .or_default();
                if ids.last() != Some(&doc_id) {
                    ids.push(doc_id);
                }
            }
        }

        self.docs.push(doc.stored_only());
        self.deleted.push(false);
        self.live += 1;
        Ok(doc_id)
    }

    /// Call `on_match` for every dictionary term matching `query`.
    pub fn for_each_match<F>(
        &self,
        query: &Query,
        cancel: Option<&AtomicBool>,
        mut on_match: F,
    ) -> Result<()>
    where
        F: FnMut(&Term, &[u32]),
    {
        let start = query.seek_term();
        for (term, ids) in self.postings.range(start..) {
            check_cancelled(cancel)?;
            if !query.in_range(term) {
                break;
            }
            if query.matches(term) {
                on_match(term, ids);
            }
        }
        Ok(())
    }

    /// Mark every document matching `query` as deleted. Returns the number of
    /// documents deleted.
    pub fn delete_matching(&mut self, query: &Query) -> Result<usize> {
        let mut doomed = Vec::new();
        self.for_each_match(query, None, |_, ids| doomed.extend_from_slice(ids))?;

        let mut deleted = 0;
        for doc_id in doomed {
            if self.is_live(doc_id) {
                self.deleted.set(doc_id as usize, true);
                self.live -= 1;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Number of live documents in `ids`.
    pub fn doc_freq(&self, ids: &[u32]) -> u64 {
        ids.iter().filter(|id| self.is_live(**id)).count() as u64
    }

    /// Walk terms with at least one live document, starting at `start`.
    pub fn visit_terms<F>(
        &self,
        start: Option<&Term>,
        cancel: Option<&AtomicBool>,
        mut visitor: F,
    ) -> Result<()>
    where
        F: FnMut(&Term, u64) -> Result<ControlFlow<()>>,
    {
        let range = match start {
            Some(start) => self.postings.range(start.clone()..),
            None => self.postings.range::<Term, _>(..),
        };

        for (term, ids) in range {
            check_cancelled(cancel)?;
            let freq = self.doc_freq(ids);
            if freq == 0 {
                continue;
            }
            if visitor(term, freq)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Drop deleted documents and renumber the survivors in order.
    pub fn compact(&mut self) {
        if self.live == self.docs.len() {
            return;
        }

        let mut remap = vec![None; self.docs.len()];
        let mut docs = Vec::with_capacity(self.live);
        for (old_id, doc) in std::mem::take(&mut self.docs).into_iter().enumerate() {
            if !self.deleted.get(old_id).unwrap_or(true) {
                remap[old_id] = Some(docs.len() as u32);
                docs.push(doc);
            }
        }

        self.postings.retain(|_, ids| {
            *ids = ids.iter().filter_map(|id| remap[*id as usize]).collect();
            !ids.is_empty()
        });
        self.deleted = BitVec::from_elem(docs.len(), false);
        self.live = docs.len();
        self.docs = docs;
    }

    /// Encode this snapshot, header included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&PayloadRef {
            docs: &self.docs,
            deleted: self.deleted.to_bytes(),
            postings: &self.postings,
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        bytes.write_u64::<LittleEndian>(payload.len() as u64)?;
        bytes.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode and verify a snapshot produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let header = SnapshotHeader::read_from(&mut cursor)?;

        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != header.payload_len {
            return Err(LucernaError::corrupted(format!(
                "expected {} payload bytes, found {}",
                header.payload_len,
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != header.checksum {
            return Err(LucernaError::corrupted("checksum mismatch"));
        }

        let payload: Payload = bincode::deserialize(payload)
            .map_err(|e| LucernaError::corrupted(format!("undecodable payload: {e}")))?;

        let mut deleted = BitVec::from_bytes(&payload.deleted);
        deleted.truncate(payload.docs.len());
        if deleted.len() != payload.docs.len() {
            return Err(LucernaError::corrupted("deletion bitmap too short"));
        }
        let live = deleted.iter().filter(|d| !d).count();

        Ok(Snapshot {
            docs: payload.docs,
            deleted,
            postings: payload.postings,
            live,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::analysis::analyzer::simple::SimpleAnalyzer;

    fn snapshot(names: &[&str]) -> Snapshot {
        let analyzer = SimpleAnalyzer::new();
        let mut snapshot = Snapshot::new();
        for name in names {
            let doc = Document::builder()
                .add_keyword("id", *name)
                .add_text("body", format!("hello {name}"))
                .build();
            snapshot.add_document(&doc, &analyzer).unwrap();
        }
        snapshot
    }

    fn matching_ids(snapshot: &Snapshot, query: &Query) -> Vec<u32> {
        let mut found = Vec::new();
        snapshot
            .for_each_match(query, None, |_, ids| {
                found.extend(ids.iter().copied().filter(|id| snapshot.document(*id).is_some()))
            })
            .unwrap();
        found.sort_unstable();
        found.dedup();
        found
    }

    #[test]
    fn test_add_and_match() {
        let snapshot = snapshot(&["a", "b"]);
        assert_eq!(snapshot.live_docs(), 2);
        assert_eq!(matching_ids(&snapshot, &Query::term("body", "hello")), vec![0, 1]);
        assert_eq!(matching_ids(&snapshot, &Query::term("id", "b")), vec![1]);
        assert_eq!(matching_ids(&snapshot, &Query::prefix("id", "")), vec![0, 1]);
    }

    #[test]
    fn test_delete_and_compact() {
        let mut snapshot = snapshot(&["a", "b", "c"]);
        assert_eq!(snapshot.delete_matching(&Query::term("id", "b")).unwrap(), 1);
        assert_eq!(snapshot.delete_matching(&Query::term("id", "b")).unwrap(), 0);
        assert_eq!(snapshot.live_docs(), 2);
        assert!(snapshot.document(1).is_none());

        snapshot.compact();
        assert_eq!(snapshot.max_doc(), 2);
        assert_eq!(snapshot.document(1).unwrap().get("id"), Some("c"));
        assert_eq!(matching_ids(&snapshot, &Query::term("id", "b")), Vec::<u32>::new());
        assert_eq!(matching_ids(&snapshot, &Query::term("id", "c")), vec![1]);
    }

    #[test]
    fn test_visit_terms_skips_dead_terms() {
        let mut snapshot = snapshot(&["a", "b"]);
        snapshot.delete_matching(&Query::term("id", "a")).unwrap();

        let mut seen = Vec::new();
        snapshot
            .visit_terms(Some(&Term::field_start("id")), None, |term, freq| {
                if term.field != "id" {
                    return Ok(ControlFlow::Break(()));
                }
                seen.push((term.text.clone(), freq));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(seen, vec![("b".to_string(), 1)]);
    }

    #[test]
    fn test_encode_decode() {
        let mut original = snapshot(&["a", "b", "c"]);
        original.delete_matching(&Query::term("id", "a")).unwrap();

        let bytes = original.encode().unwrap();
        let decoded = Snapshot::decode(&bytes).unwrap();
        assert_eq!(decoded.live_docs(), 2);
        assert_eq!(decoded.term_count(), original.term_count());
        assert!(decoded.document(0).is_none());
        assert_eq!(decoded.document(2).unwrap().get("id"), Some("c"));
    }

    #[test]
    fn test_decode_rejects_damage() {
        let bytes = snapshot(&["a"]).encode().unwrap();

        let mut flipped = bytes.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xff;
        assert!(matches!(
            Snapshot::decode(&flipped),
            Err(LucernaError::Corrupted(_))
        ));

        assert!(Snapshot::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Snapshot::decode(b"NOPE").is_err());
    }
}
