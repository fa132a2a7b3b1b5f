//! Structured values.

use super::mask::ChangeMask;
use super::structure::{ScalarType, Structure};
use super::PvDataError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
}

impl ScalarValue {
    /// Zero value for a scalar type.
    pub fn default_for(kind: ScalarType) -> Self {
        match kind {
            ScalarType::Bool => ScalarValue::Bool(false),
            ScalarType::Int => ScalarValue::Int(0),
            ScalarType::Double => ScalarValue::Double(0.0),
            ScalarType::String => ScalarValue::String(String::new()),
        }
    }

    /// Scalar type of this value.
    pub fn kind(&self) -> ScalarType {
        match self {
            ScalarValue::Bool(_) => ScalarType::Bool,
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::Double(_) => ScalarType::Double,
            ScalarValue::String(_) => ScalarType::String,
        }
    }

    /// Numeric view, if the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view, if the value is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// A value of a given [`Structure`].
#[derive(Debug, Clone, PartialEq)]
pub struct PvStructure {
    structure: Arc<Structure>,
    values: Vec<ScalarValue>,
}

impl PvStructure {
    /// Default-initialized value of `structure`.
    pub fn new(structure: Arc<Structure>) -> Self {
        let values = structure
            .fields()
            .iter()
            .map(|f| ScalarValue::default_for(f.kind))
            .collect();
        Self { structure, values }
    }

    /// Empty request/value with no fields.
    pub fn empty() -> Self {
        Self::new(Structure::builder("").build())
    }

    /// Type descriptor.
    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    /// Field value by name.
    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.structure
            .field_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Field value by index.
    pub fn get_index(&self, index: usize) -> Option<&ScalarValue> {
        self.values.get(index)
    }

    /// Assign a field.
    ///
    /// # Errors
    /// `NoSuchField` for an unknown name, `WrongScalarType` on a type mismatch.
    pub fn set(&mut self, name: &str, value: ScalarValue) -> Result<(), PvDataError> {
        let index = self
            .structure
            .field_index(name)
            .ok_or_else(|| PvDataError::NoSuchField(name.to_string()))?;
        let expected = self.structure.fields()[index].kind;
        if value.kind() != expected {
            return Err(PvDataError::WrongScalarType {
                field: name.to_string(),
                expected,
            });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: ScalarValue) -> Result<Self, PvDataError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Copy the fields of `src` selected by `changed` into `self`.
    ///
    /// # Errors
    /// `TypeMismatch` when the descriptors differ.
    pub fn copy_changed(
        &mut self,
        src: &PvStructure,
        changed: &ChangeMask,
    ) -> Result<(), PvDataError> {
        if self.structure != src.structure {
            return Err(PvDataError::TypeMismatch {
                expected: self.structure.id().to_string(),
                found: src.structure.id().to_string(),
            });
        }
        for (i, (dst, value)) in self.values.iter_mut().zip(&src.values).enumerate() {
            if changed.covers_field(i) {
                dst.clone_from(value);
            }
        }
        Ok(())
    }
}
