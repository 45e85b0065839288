use std::fmt;

use serde::{de::Visitor, ser::SerializeMap, Deserialize, Serialize};

/// Sorted key/value tag set attached to a wallet record, serialized as a map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordTags {
    inner: Vec<(String, String)>,
}

impl Serialize for RecordTags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for tag in self.inner.iter() {
            map.serialize_entry(&tag.0, &tag.1)?
        }
        map.end()
    }
}

struct RecordTagsVisitor;

impl<'de> Visitor<'de> for RecordTagsVisitor {
    type Value = RecordTags;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "a map representing record tags")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut tags = RecordTags::new(vec![]);
        while let Some((key, value)) = map.next_entry::<String, String>()? {
            tags.add(key, value);
        }
        Ok(tags)
    }
}

impl<'de> Deserialize<'de> for RecordTags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordTagsVisitor)
    }
}

impl RecordTags {
    pub fn new(inner: Vec<(String, String)>) -> Self {
        let mut items = inner;
        items.sort();
        Self { inner: items }
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.inner.retain(|(existing, _)| existing != &key);
        self.inner.push((key, value.into()));
        self.inner.sort();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.retain(|(existing, _)| existing != key);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.inner.iter()
    }
}

impl FromIterator<(String, String)> for RecordTags {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
