//! Textual snapshot format for the whole tree.
//!
//! A snapshot is a JSON object mapping top-level names to nodes; each node
//! mirrors the in-memory shape (`id`, `type`, `icon`, `children`,
//! `editorData`, `content`). Children mappings keep their insertion order.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::app::tree::MAX_DEPTH;
use crate::domain::model::{EditorData, NodeKind, ProcessContent};

/// Serialized form of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "ordered_map::option"
    )]
    pub children: Option<Vec<(String, SnapshotNode)>>,
    #[serde(
        rename = "editorData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub editor_data: Option<EditorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ProcessContent>,
}

/// Renders the top-level mapping as pretty-printed JSON.
pub fn write(entries: &[(String, SnapshotNode)]) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::pretty(&mut buffer);
    ordered_map::serialize(entries, &mut serializer)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// JSON nesting accepted by [`read`]: two levels per tree level plus room for editor data.
pub const MAX_NESTING: usize = 2 * MAX_DEPTH + 64;

/// Parses a snapshot, rejecting trailing input and duplicate sibling names.
///
/// serde_json's own recursion limit would stop well short of [`MAX_DEPTH`], so it
/// is replaced by an upfront scan bounding the nesting at [`MAX_NESTING`].
pub fn read(text: &str) -> Result<Vec<(String, SnapshotNode)>, serde_json::Error> {
    if let Some(offset) = nesting_overflow(text, MAX_NESTING) {
        return Err(<serde_json::Error as DeError>::custom(format!(
            "nesting deeper than {MAX_NESTING} at byte {offset}"
        )));
    }
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let entries = ordered_map::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(entries)
}

/// Byte offset where array/object nesting first exceeds `limit`, ignoring string contents.
fn nesting_overflow(text: &str, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > limit {
                    return Some(offset);
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Serde helpers mapping `Vec<(String, T)>` to a JSON object in insertion order.
pub mod ordered_map {
    use super::*;

    pub fn serialize<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }

    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for OrderedVisitor<T>
    where
        T: Deserialize<'de>,
    {
        type Value = Vec<(String, T)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping from unique names to nodes")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries: Vec<(String, T)> =
                Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, value)) = access.next_entry::<String, T>()? {
                if entries.iter().any(|(existing, _)| *existing == name) {
                    return Err(A::Error::custom(format_args!("duplicate name '{name}'")));
                }
                entries.push((name, value));
            }
            Ok(entries)
        }
    }

    /// Serde helpers for `Option<Vec<(String, T)>>`.
    pub mod option {
        use super::*;

        pub fn serialize<S, T>(
            value: &Option<Vec<(String, T)>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
            T: Serialize,
        {
            match value {
                Some(entries) => serializer.serialize_some(&Ordered(entries)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D, T>(
            deserializer: D,
        ) -> Result<Option<Vec<(String, T)>>, D::Error>
        where
            D: Deserializer<'de>,
            T: Deserialize<'de>,
        {
            deserializer.deserialize_option(OptionVisitor(PhantomData))
        }

        struct Ordered<'a, T>(&'a [(String, T)]);

        impl<T: Serialize> Serialize for Ordered<'_, T> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                super::serialize(self.0, serializer)
            }
        }

        struct OptionVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for OptionVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = Option<Vec<(String, T)>>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("null or a mapping from unique names to nodes")
            }

            fn visit_none<E: DeError>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_unit<E: DeError>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                super::deserialize(deserializer).map(Some)
            }
        }
    }
}
