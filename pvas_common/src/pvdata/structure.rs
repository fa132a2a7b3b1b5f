//! Type descriptors.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scalar field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
}

/// A named scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within its structure.
    pub name: String,
    /// Field type.
    pub kind: ScalarType,
}

/// Structural schema of a shared value.
///
/// Shared as `Arc<Structure>`; two values have the same type when their
/// descriptors compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    id: String,
    fields: Vec<Field>,
}

impl Structure {
    /// Start building a structure with the given type id.
    pub fn builder(id: impl Into<String>) -> StructureBuilder {
        StructureBuilder {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Normative-type style scalar wrapper: a single `value` field.
    pub fn scalar(kind: ScalarType) -> Arc<Structure> {
        Structure::builder("epics:nt/NTScalar:1.0")
            .add("value", kind)
            .build()
    }

    /// Type id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ordered fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of bits a change mask needs to cover this structure.
    pub fn num_bits(&self) -> usize {
        self.fields.len() + 1
    }
}

/// Builder for [`Structure`].
#[derive(Debug)]
pub struct StructureBuilder {
    id: String,
    fields: Vec<Field>,
}

impl StructureBuilder {
    /// Append a field. A repeated name replaces the earlier declaration.
    pub fn add(mut self, name: impl Into<String>, kind: ScalarType) -> Self {
        let name = name.into();
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == name) {
            existing.kind = kind;
        } else {
            self.fields.push(Field { name, kind });
        }
        self
    }

    /// Finish.
    pub fn build(self) -> Arc<Structure> {
        Arc::new(Structure {
            id: self.id,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_field_order() {
        let s = Structure::builder("test:t")
            .add("b", ScalarType::Int)
            .add("a", ScalarType::Double)
            .build();
        assert_eq!(s.id(), "test:t");
        assert_eq!(s.field_index("b"), Some(0));
        assert_eq!(s.field_index("a"), Some(1));
        assert_eq!(s.num_bits(), 3);
    }

    #[test]
    fn builder_replaces_duplicate_field() {
        let s = Structure::builder("test:t")
            .add("x", ScalarType::Int)
            .add("x", ScalarType::String)
            .build();
        assert_eq!(s.fields().len(), 1);
        assert_eq!(s.field("x").map(|f| f.kind), Some(ScalarType::String));
    }
}
