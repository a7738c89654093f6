use serde::Serialize;

/// Action line preceding each document in a `_bulk` request body,
/// serialized as `{"index":{"_index":"<name>"}}`.
#[derive(Debug, Serialize)]
pub struct BulkAction<'a> {
    index: BulkIndexMeta<'a>,
}

#[derive(Debug, Serialize)]
struct BulkIndexMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

impl<'a> BulkAction<'a> {
    pub fn new(index: &'a str) -> Self {
        Self {
            index: BulkIndexMeta { index },
        }
    }
}
