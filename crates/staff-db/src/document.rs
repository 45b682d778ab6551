use serde_json::{Map, Value};

/// Field map of a single document.
pub type Fields = Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Collection names, document ids and field names may not be empty or
/// contain a path separator.
pub(crate) fn valid_segment(segment: &str) -> bool {
    !segment.trim().is_empty() && !segment.contains('/')
}
