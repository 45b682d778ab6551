use crate::{document::valid_segment, Document, Error};
use serde_json::Value;

/// Equality-filtered read over one collection.
///
/// Building the query is where malformed collection or field names are
/// rejected, before anything is sent to the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<(String, Value)>,
}

impl Query {
    pub fn new(collection: &str) -> Result<Self, Error> {
        if !valid_segment(collection) {
            return Err(Error::InvalidQuery(format!(
                "collection name {collection:?} is not valid"
            )));
        }
        Ok(Self {
            collection: collection.to_owned(),
            filters: Vec::new(),
        })
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Result<Self, Error> {
        if !valid_segment(field) {
            return Err(Error::InvalidQuery(format!(
                "field name {field:?} is not valid"
            )));
        }
        self.filters.push((field.to_owned(), value.into()));
        Ok(self)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| document.field(field) == Some(value))
    }
}
