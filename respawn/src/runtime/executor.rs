use redis::aio::ConnectionLike;
use serde_json::Value;

use crate::{
    errors::StoreError,
    runtime::{commands::DocumentCommand, scripts::DOCUMENT_WRITE_SCRIPT},
    types::DocumentPath,
};

/// Runs one command through the document write script and returns its reply.
pub async fn execute_command<C>(conn: &mut C, path: &DocumentPath, command: &DocumentCommand) -> Result<Value, StoreError>
where
    C: ConnectionLike + Send,
{
    let payload = serde_json::to_string(command)
        .map_err(|err| StoreError::other(format!("failed to serialize command: {err}")))?;

    let mut invocation = DOCUMENT_WRITE_SCRIPT.prepare_invoke();
    invocation.arg(payload);
    let raw: String = invocation.invoke_async(conn).await?;

    let value: Value =
        serde_json::from_str(&raw).map_err(|err| StoreError::other(format!("failed to parse lua response: {err}")))?;

    if let Some(error) = value.get("error") {
        return Err(match error.as_str() {
            Some("not_found") => StoreError::NotFound { path: path.clone() },
            Some("already_exists") => StoreError::invalid(format!("document {path} already exists")),
            Some("not_numeric") => StoreError::invalid(format!("cannot increment a non-integer field of {path}")),
            Some("not_array") => StoreError::invalid(format!("array operation on a non-array field of {path}")),
            Some(other) => StoreError::other(other.to_string()),
            None => StoreError::other("lua_error"),
        });
    }

    Ok(value)
}

#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    async fn execute(&mut self, path: &DocumentPath, command: DocumentCommand) -> Result<Value, StoreError>;
}

pub struct RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    connection: &'a mut C,
}

impl<'a, C> RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    pub fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<C> CommandExecutor for RedisExecutor<'_, C>
where
    C: ConnectionLike + Send,
{
    async fn execute(&mut self, path: &DocumentPath, command: DocumentCommand) -> Result<Value, StoreError> {
        execute_command(self.connection, path, &command).await
    }
}
