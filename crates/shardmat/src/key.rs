//! Shard key codec
//!
//! Every object of a matrix lives under its namespace root
//! `{prefix}{name}/`. Shard keys append one `{start}_{end}_{shard_size}_`
//! segment per axis, so a shard key carries everything needed to turn a
//! listing back into coordinates:
//!
//! ```text
//! shardmat.objects/gram/0_2_2_2_4_2_     rows [0,2), cols [2,4), 2x2 shards
//! shardmat.objects/gram/header           not a shard, never decodes
//! ```

use tracing::trace;

use crate::geometry::RealRange;

/// Name of the header object under the namespace root
pub const HEADER_OBJECT: &str = "header";

/// A shard key broken back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedShard {
    /// Real range per axis
    pub ranges: Vec<RealRange>,
    /// Declared shard size per axis
    pub shard_sizes: Vec<usize>,
}

/// Encoder/decoder for the keys of one matrix namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    root: String,
}

impl KeyCodec {
    /// Codec for matrix `name` under `prefix`
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            root: format!("{prefix}{name}/"),
        }
    }

    /// Namespace root, ending in `/`
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Key of the header object
    pub fn header_key(&self) -> String {
        format!("{}{HEADER_OBJECT}", self.root)
    }

    /// Key of the shard with these ranges and shard sizes
    pub fn encode(&self, ranges: &[RealRange], shard_sizes: &[usize]) -> String {
        let mut key = self.root.clone();
        key.push_str(&encode_segments(ranges, shard_sizes));
        key
    }

    /// Parse a listed key; anything that is not a shard key yields `None`
    pub fn decode(&self, object_key: &str) -> Option<DecodedShard> {
        let Some(segments) = object_key.strip_prefix(&self.root) else {
            trace!(key = object_key, root = %self.root, "Key outside namespace");
            return None;
        };
        let decoded = decode_segments(segments);
        if decoded.is_none() {
            trace!(key = object_key, "Not a shard key");
        }
        decoded
    }
}

/// `{start}_{end}_{shard_size}_` for each axis in order
pub fn encode_segments(ranges: &[RealRange], shard_sizes: &[usize]) -> String {
    ranges
        .iter()
        .zip(shard_sizes)
        .map(|(range, size)| format!("{}_{}_{}_", range.start, range.end, size))
        .collect()
}

/// Inverse of [`encode_segments`]
pub fn decode_segments(segments: &str) -> Option<DecodedShard> {
    let body = segments.strip_suffix('_')?;
    let fields = body
        .split('_')
        .map(|field| {
            // `parse` accepts a leading '+', which encode never writes.
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            field.parse::<usize>().ok()
        })
        .collect::<Option<Vec<usize>>>()?;

    if fields.len() % 3 != 0 {
        return None;
    }

    let mut ranges = Vec::with_capacity(fields.len() / 3);
    let mut shard_sizes = Vec::with_capacity(fields.len() / 3);
    for triple in fields.chunks_exact(3) {
        let (start, end, size) = (triple[0], triple[1], triple[2]);
        if end <= start || size == 0 || end - start > size {
            return None;
        }
        ranges.push(RealRange::new(start, end));
        shard_sizes.push(size);
    }

    Some(DecodedShard {
        ranges,
        shard_sizes,
    })
}
