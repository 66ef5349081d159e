use serde::Serialize;

use crate::{errors::StoreError, store::FieldOperation};

/// Payload consumed by `lua/document_write.lua`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCommand {
    Set(SetDocument),
    Update(UpdateDocument),
    Upsert(UpsertDocument),
    Delete(DeleteDocument),
}

#[derive(Debug, Serialize)]
pub struct SetDocument {
    pub key: String,
    pub index_key: String,
    pub channel: String,
    pub document_id: String,
    pub payload_json: String,
    /// Fail with `already_exists` instead of overwriting.
    pub must_not_exist: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateDocument {
    pub key: String,
    pub channel: String,
    pub operations: Vec<OperationPayload>,
}

/// Create-or-update executed in one script to avoid races between the
/// existence check and the write.
#[derive(Debug, Serialize)]
pub struct UpsertDocument {
    pub key: String,
    pub index_key: String,
    pub channel: String,
    pub document_id: String,
    pub create_payload_json: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<OperationPayload>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocument {
    pub key: String,
    pub index_key: String,
    pub channel: String,
    pub document_id: String,
}

#[derive(Debug, Serialize)]
pub struct OperationPayload {
    pub field: String,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// JSON-encoded operands, passed verbatim to RedisJSON.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values_json: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Assign,
    ArrayUnion,
    ArrayRemove,
    Increment,
}

pub fn build_operation_payloads(operations: &[FieldOperation]) -> Result<Vec<OperationPayload>, StoreError> {
    operations.iter().map(build_operation_payload).collect()
}

fn build_operation_payload(operation: &FieldOperation) -> Result<OperationPayload, StoreError> {
    let encode = |value: &serde_json::Value| {
        serde_json::to_string(value).map_err(|err| StoreError::other(format!("failed to encode operand: {err}")))
    };
    let payload = match operation {
        FieldOperation::Assign { field, value } => OperationPayload {
            field: field.clone(),
            op_type: OperationType::Assign,
            values_json: vec![encode(value)?],
            by: None,
        },
        FieldOperation::ArrayUnion { field, values } => OperationPayload {
            field: field.clone(),
            op_type: OperationType::ArrayUnion,
            values_json: values.iter().map(encode).collect::<Result<_, _>>()?,
            by: None,
        },
        FieldOperation::ArrayRemove { field, values } => OperationPayload {
            field: field.clone(),
            op_type: OperationType::ArrayRemove,
            values_json: values.iter().map(encode).collect::<Result<_, _>>()?,
            by: None,
        },
        FieldOperation::Increment { field, by } => OperationPayload {
            field: field.clone(),
            op_type: OperationType::Increment,
            values_json: Vec::new(),
            by: Some(*by),
        },
    };
    Ok(payload)
}
