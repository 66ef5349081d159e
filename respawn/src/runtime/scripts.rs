use redis::Script;
use std::sync::LazyLock;

pub const DOCUMENT_WRITE_SCRIPT_BODY: &str = include_str!("../../lua/document_write.lua");

pub static DOCUMENT_WRITE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DOCUMENT_WRITE_SCRIPT_BODY));
