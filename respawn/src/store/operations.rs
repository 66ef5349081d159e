use serde_json::{Number, Value};

use crate::{errors::StoreError, types::Document, validators::is_valid_field_name};

/// Atomic mutation of a single top-level field.
///
/// The store applies a list of these to one document as a unit; no other writer
/// observes a partially applied list.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOperation {
    /// Overwrite the field.
    Assign { field: String, value: Value },
    /// Append each value not already present. A missing field starts as `[]`.
    ArrayUnion { field: String, values: Vec<Value> },
    /// Remove every element equal to any of the values.
    ArrayRemove { field: String, values: Vec<Value> },
    /// Add `by` to an integer field. A missing field counts as zero.
    Increment { field: String, by: i64 },
}

impl FieldOperation {
    pub fn assign(field: &str, value: impl Into<Value>) -> Self {
        Self::Assign {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn array_union(field: &str, value: impl Into<Value>) -> Self {
        Self::ArrayUnion {
            field: field.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn array_remove(field: &str, value: impl Into<Value>) -> Self {
        Self::ArrayRemove {
            field: field.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn increment(field: &str, by: i64) -> Self {
        Self::Increment {
            field: field.to_string(),
            by,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Assign { field, .. }
            | Self::ArrayUnion { field, .. }
            | Self::ArrayRemove { field, .. }
            | Self::Increment { field, .. } => field,
        }
    }
}

/// Rejects operation lists the backends cannot apply atomically.
pub fn validate_operations(operations: &[FieldOperation]) -> Result<(), StoreError> {
    if operations.is_empty() {
        return Err(StoreError::invalid("update requires at least one field operation"));
    }
    for operation in operations {
        if !is_valid_field_name(operation.field()) {
            return Err(StoreError::invalid(format!(
                "'{}' is not a valid field name",
                operation.field()
            )));
        }
    }
    Ok(())
}

/// Applies `operations` in order to an in-memory document.
///
/// The document is only modified if every operation succeeds.
pub fn apply_operations(document: &mut Document, operations: &[FieldOperation]) -> Result<(), StoreError> {
    validate_operations(operations)?;
    let mut working = document.clone();
    for operation in operations {
        match operation {
            FieldOperation::Assign { field, value } => {
                working.insert(field.clone(), value.clone());
            }
            FieldOperation::ArrayUnion { field, values } => {
                let array = array_field(&mut working, field)?;
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
            }
            FieldOperation::ArrayRemove { field, values } => {
                let array = array_field(&mut working, field)?;
                array.retain(|element| !values.contains(element));
            }
            FieldOperation::Increment { field, by } => {
                let current = match working.get(field) {
                    None | Some(Value::Null) => 0,
                    Some(Value::Number(number)) => number.as_i64().ok_or_else(|| {
                        StoreError::invalid(format!("field '{field}' is not an integer"))
                    })?,
                    Some(_) => {
                        return Err(StoreError::invalid(format!("cannot increment non-numeric field '{field}'")));
                    }
                };
                let next = current
                    .checked_add(*by)
                    .ok_or_else(|| StoreError::invalid(format!("increment of '{field}' overflows")))?;
                working.insert(field.clone(), Value::Number(Number::from(next)));
            }
        }
    }
    *document = working;
    Ok(())
}

fn array_field<'a>(document: &'a mut Document, field: &str) -> Result<&'a mut Vec<Value>, StoreError> {
    let slot = document.entry(field.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| StoreError::invalid(format!("field '{field}' is not an array")))
}
