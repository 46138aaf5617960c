use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, SessionError};

/// Leading bytes that mark a message as XML metadata rather than a sample.
pub const METADATA_MARKER: &[u8] = b"<?xml";

/// Node key -> node name, as announced by the most recent metadata message.
///
/// The map is immutable once built. Every metadata message produces a fresh
/// map that replaces the previous one; entries are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NameMap {
    names: BTreeMap<u32, String>,
}

impl NameMap {
    /// Name of the node with `key`.
    pub fn get(&self, key: u32) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Whether the map names `key`.
    pub fn contains_key(&self, key: u32) -> bool {
        self.names.contains_key(&key)
    }

    /// Number of named nodes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the map names no nodes.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(key, name)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.names.iter().map(|(key, name)| (*key, name.as_str()))
    }
}

impl FromIterator<(u32, String)> for NameMap {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Whether a message payload is XML metadata.
///
/// Classification is content sniffing only: the framing carries no type tag.
pub fn is_metadata(payload: &[u8]) -> bool {
    payload.starts_with(METADATA_MARKER)
}

/// Parse a metadata payload into a [`NameMap`].
///
/// Every `node` element below the document root contributes one entry if it
/// carries both a `key` and an `id` attribute:
///
/// ```text
/// <?xml version="1.0"?>
/// <node key="0" id="default">
///   <node key="1" id="Hips"/>
///   <node key="2" id="Chest"><node key="3" id="Head"/></node>
/// </node>
/// ```
///
/// yields `{1: "Hips", 2: "Chest", 3: "Head"}`. The root element itself is
/// never an entry. Later duplicates of a key win.
pub fn parse_metadata(payload: &[u8]) -> Result<NameMap> {
    let text = std::str::from_utf8(payload)
        .map_err(|err| SessionError::MalformedMetadata(format!("not UTF-8: {err}")))?;
    let document = roxmltree::Document::parse(text)
        .map_err(|err| SessionError::MalformedMetadata(err.to_string()))?;

    let mut names = BTreeMap::new();
    for node in document
        .root_element()
        .descendants()
        .skip(1)
        .filter(|node| node.has_tag_name("node"))
    {
        let (Some(key), Some(id)) = (node.attribute("key"), node.attribute("id")) else {
            continue;
        };
        let key: u32 = key.trim().parse().map_err(|_| {
            SessionError::MalformedMetadata(format!("node '{id}' has non-integer key '{key}'"))
        })?;
        names.insert(key, id.to_string());
    }

    Ok(NameMap { names })
}
