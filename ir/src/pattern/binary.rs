//! Self-describing binary form of pattern tables.
//!
//! A blob is the CBOR encoding of [`PatternBlob`]: a format tag, a version,
//! the root id, every table entry in id order and the id names. Decoding
//! checks that the blob could have been produced by [`crate::PatternBuilder`]
//! (children precede parents, operand and optional lists agree, names are
//! unique), so a decoded pattern matches exactly like the encoded one.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use super::{Pattern, PatternId, PatternKind, PatternTable};
use crate::error::*;

pub const FORMAT: &str = "graft-pattern";
pub const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PatternBlob {
    format: String,
    version: u32,
    root: PatternId,
    kinds: Vec<PatternKind>,
    names: Vec<(PatternId, String)>,
}

impl Pattern {
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let blob = PatternBlob {
            format: FORMAT.to_string(),
            version: VERSION,
            root: self.root(),
            kinds: self.table().kinds().to_vec(),
            names: self
                .table()
                .names()
                .iter()
                .enumerate()
                .filter_map(|(i, n)| n.clone().map(|n| (PatternId::from_raw(i as u32), n)))
                .collect(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&blob, &mut bytes).context(PatternEncodeSnafu)?;
        Ok(bytes)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Pattern> {
        let blob: PatternBlob = ciborium::from_reader(bytes).context(PatternDecodeSnafu)?;
        ensure!(blob.format == FORMAT, PatternFormatSnafu { format: blob.format });
        ensure!(blob.version == VERSION, PatternVersionSnafu { version: blob.version });
        validate(&blob)?;

        let mut names = vec![None; blob.kinds.len()];
        for (id, name) in blob.names {
            names[id.index()] = Some(name);
        }
        Ok(Pattern::new(Arc::new(PatternTable::new(blob.kinds, names)), blob.root))
    }

    /// `xxh64` of the binary form. Stable across processes for equal tables and roots.
    pub fn fingerprint(&self) -> Result<u64> {
        Ok(xxhash_rust::xxh64::xxh64(&self.to_binary()?, 0))
    }
}

fn malformed(reason: String) -> Error {
    PatternMalformedSnafu { reason }.build()
}

fn validate(blob: &PatternBlob) -> Result<()> {
    let len = blob.kinds.len();
    ensure!(
        blob.root.index() < len,
        PatternMalformedSnafu { reason: format!("root {} outside {len} entries", blob.root) }
    );

    for (index, kind) in blob.kinds.iter().enumerate() {
        let id = PatternId::from_raw(index as u32);
        for child in kind.children() {
            if child >= id {
                return Err(malformed(format!("{id} refers to {child}, children must precede parents")));
            }
        }
        match kind {
            PatternKind::Node { operands, optional, attrs, .. } => {
                if operands.len() != optional.len() {
                    return Err(malformed(format!(
                        "{id} has {} operands but {} optional flags",
                        operands.len(),
                        optional.len()
                    )));
                }
                if attrs.windows(2).any(|w| w[0].0 >= w[1].0) {
                    return Err(malformed(format!("{id} attribute constraints are not sorted and unique")));
                }
            }
            PatternKind::Or(items) | PatternKind::Sequence(items) if items.is_empty() => {
                return Err(malformed(format!("{id} has no alternatives")));
            }
            _ => {}
        }
    }

    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();
    for (id, name) in &blob.names {
        if id.index() >= len {
            return Err(malformed(format!("name '{name}' on {id} outside {len} entries")));
        }
        if !seen_ids.insert(*id) || !seen_names.insert(name.as_str()) {
            return Err(malformed(format!("duplicate name entry '{name}' on {id}")));
        }
    }
    Ok(())
}
