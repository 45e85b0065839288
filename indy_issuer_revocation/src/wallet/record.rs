use typed_builder::TypedBuilder;

use crate::wallet::{record_category::RecordCategory, record_tags::RecordTags};

/// A single tag-queryable wallet entry.
#[derive(Debug, Clone, PartialEq, TypedBuilder, Serialize, Deserialize)]
pub struct Record {
    category: RecordCategory,
    name: String,
    value: String,
    #[builder(default)]
    tags: RecordTags,
}

impl Record {
    pub fn category(&self) -> RecordCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn tags(&self) -> &RecordTags {
        &self.tags
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn set_tags(&mut self, tags: RecordTags) {
        self.tags = tags;
    }
}
