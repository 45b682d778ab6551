use crate::{Fields, SetMode};

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        fields: Fields,
        mode: SetMode,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Writes collected locally and handed to [`crate::Backend::commit`] as one unit.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, fields: Fields, mode: SetMode) {
        self.ops.push(WriteOp::Set {
            collection: collection.to_owned(),
            id: id.to_owned(),
            fields,
            mode,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_owned(),
            id: id.to_owned(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
