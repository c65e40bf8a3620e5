//! Strand-symmetric sequence deduplication.
//!
//! A sequence and its reverse complement count as the same molecule. Each
//! retained sequence records the SHA-256 digests of both orientations; a
//! later sequence matching either digest is dropped, so the first occurrence
//! in file order always wins.

use anyhow::Result;
use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};

use crate::seqio::FastaChunk;
use crate::translate::reverse_complement;

type SeqDigest = [u8; 32];

fn digest(seq: &str) -> SeqDigest {
    Sha256::digest(seq.as_bytes()).into()
}

/// Running deduplication state.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: FxHashSet<SeqDigest>,
    retained: usize,
    dropped: usize,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers one sequence; returns `true` if it is retained.
    pub fn offer(&mut self, seq: &str) -> bool {
        let forward = digest(seq);
        if self.seen.contains(&forward) {
            self.dropped += 1;
            return false;
        }

        let reverse = digest(&reverse_complement(seq));
        if self.seen.contains(&reverse) {
            self.dropped += 1;
            return false;
        }

        self.seen.insert(forward);
        self.seen.insert(reverse);
        self.retained += 1;
        true
    }

    pub fn retained(&self) -> usize {
        self.retained
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Filters a record stream down to the ids of unique candidates.
    ///
    /// Records whose id is not in `candidates` are skipped without being
    /// hashed. Ids are returned in file order.
    pub fn retain_unique<I>(&mut self, records: I, candidates: &FxHashSet<String>) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = Result<FastaChunk>>,
    {
        let mut kept = Vec::new();
        for record in records {
            let record = record?;
            if !candidates.contains(record.id()) {
                continue;
            }
            if self.offer(&record.sequence()) {
                kept.push(record.id().to_string());
            }
        }
        log::info!(
            "Retained {} unique sequences ({} duplicates removed)",
            self.retained,
            self.dropped
        );
        Ok(kept)
    }
}
