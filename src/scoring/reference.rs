use std::collections::HashMap;

use crate::model::{ContentId, ReferencePassage};

/// Context passages keyed by `(content_id, qa_index)`. Built once per session
/// and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLookup {
    passages: HashMap<ContentId, HashMap<i64, String>>,
    len: usize,
}

impl ReferenceLookup {
    /// Later passages for the same key replace earlier ones.
    pub fn from_passages(passages: impl IntoIterator<Item = ReferencePassage>) -> Self {
        let mut lookup = Self::default();
        for passage in passages {
            let previous = lookup
                .passages
                .entry(passage.content_id)
                .or_default()
                .insert(passage.qa_index, passage.content_text.unwrap_or_default());
            if previous.is_none() {
                lookup.len += 1;
            }
        }
        lookup
    }

    pub fn get(&self, content_id: &ContentId, qa_index: i64) -> Option<&str> {
        self.passages
            .get(content_id)
            .and_then(|by_index| by_index.get(&qa_index))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
