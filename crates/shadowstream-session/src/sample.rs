use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Result, SessionError};

/// Record header: key (4B LE) + count (4B LE).
const RECORD_HEADER_SIZE: usize = 8;
const VALUE_SIZE: usize = 4;

/// One time step of measurements: node key -> channel values.
///
/// Keys are unique and keep wire order. Each node carries its own number of
/// values, so two nodes in the same sample may differ in length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    nodes: Vec<(u32, Vec<f32>)>,
}

impl Sample {
    /// Create an empty sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values for `key`.
    ///
    /// A key that is already present keeps its position and gets the new
    /// values.
    pub fn insert(&mut self, key: u32, values: Vec<f32>) {
        match self.nodes.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = values,
            None => self.nodes.push((key, values)),
        }
    }

    /// Values for one node.
    pub fn get(&self, key: u32) -> Option<&[f32]> {
        self.nodes
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Whether the sample carries `key`.
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Number of nodes in this sample.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the sample has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys in wire order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().map(|(key, _)| *key)
    }

    /// `(key, values)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[f32])> + '_ {
        self.nodes
            .iter()
            .map(|(key, values)| (*key, values.as_slice()))
    }

    /// Total number of values across all nodes.
    pub fn value_count(&self) -> usize {
        self.nodes.iter().map(|(_, values)| values.len()).sum()
    }

    /// All values of all nodes, concatenated in wire order.
    pub fn flatten(&self) -> Vec<f32> {
        self.nodes
            .iter()
            .flat_map(|(_, values)| values.iter().copied())
            .collect()
    }
}

impl FromIterator<(u32, Vec<f32>)> for Sample {
    fn from_iter<I: IntoIterator<Item = (u32, Vec<f32>)>>(iter: I) -> Self {
        let mut sample = Sample::new();
        for (key, values) in iter {
            sample.insert(key, values);
        }
        sample
    }
}

impl IntoIterator for Sample {
    type Item = (u32, Vec<f32>);
    type IntoIter = std::vec::IntoIter<(u32, Vec<f32>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (key, values) in &self.nodes {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

/// Decode a binary sample payload.
///
/// Layout, all fields 4-byte little-endian, densely packed:
/// ```text
/// node   := [key: u32] [count: u32] [count x f32]
/// sample := node*
/// ```
/// Note the header of the enclosing message is big-endian; the payload is not.
pub fn decode_sample(payload: &[u8]) -> Result<Sample> {
    let mut sample = Sample::new();
    let mut buf = payload;

    while buf.has_remaining() {
        let offset = payload.len() - buf.remaining();
        if buf.remaining() < RECORD_HEADER_SIZE {
            return Err(SessionError::MalformedPayload(format!(
                "{} trailing bytes at offset {offset} do not form a record header",
                buf.remaining()
            )));
        }

        let key = buf.get_u32_le();
        let count = buf.get_u32_le() as usize;

        let needed = count.checked_mul(VALUE_SIZE).ok_or_else(|| {
            SessionError::MalformedPayload(format!("node {key} value count {count} overflows"))
        })?;
        if buf.remaining() < needed {
            return Err(SessionError::MalformedPayload(format!(
                "node {key} at offset {offset} declares {count} values ({needed} bytes) \
                 but only {} bytes remain",
                buf.remaining()
            )));
        }

        let values = (0..count).map(|_| buf.get_f32_le()).collect();
        sample.insert(key, values);
    }

    Ok(sample)
}

/// Encode a sample into the binary payload layout read by [`decode_sample`].
pub fn encode_sample(sample: &Sample) -> Bytes {
    let size = sample.len() * RECORD_HEADER_SIZE + sample.value_count() * VALUE_SIZE;
    let mut dst = BytesMut::with_capacity(size);
    for (key, values) in sample.iter() {
        dst.put_u32_le(key);
        dst.put_u32_le(values.len() as u32);
        for value in values {
            dst.put_f32_le(*value);
        }
    }
    dst.freeze()
}
