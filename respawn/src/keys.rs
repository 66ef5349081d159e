/// Redis key construction for the document store.
#[derive(Debug, Clone)]
pub struct KeyContext {
    prefix: String,
}

impl KeyContext {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// RedisJSON key holding a single document.
    pub fn document(&self, collection: &str, document_id: &str) -> String {
        format!("{}:doc:{}:{}", self.prefix, collection, document_id)
    }

    /// Set of every document id written to a collection.
    pub fn collection_index(&self, collection: &str) -> String {
        format!("{}:idx:{}", self.prefix, collection)
    }

    /// Pub/sub channel announcing writes to a single document.
    pub fn changes(&self, collection: &str, document_id: &str) -> String {
        format!("{}:changes:{}:{}", self.prefix, collection, document_id)
    }
}
