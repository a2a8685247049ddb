//! Row addressing: hashed secondary-index point lookups and primary-index
//! pagination over the contract's `keyval` table.

use futures_util::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chain::{ChainRpc, TableRowsQuery};
use crate::error::{ensure, Error, Result};

/// Contract table holding one row per stored key.
pub const TABLE: &str = "keyval";

/// Rows per pagination request.
const PAGE_LIMIT: u32 = 100;

/// One stored key/value row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tag_id: u64,
    pub key: String,
    pub value: String,
}

/// Digest addressing a row on the hashed secondary index: hex SHA-256 of
/// `"{category}-{key}"` with the category in decimal.
pub fn compute_locator(category: u64, key: &str) -> Result<String> {
    ensure(!key.is_empty(), "key required.")?;
    let digest = Sha256::digest(format!("{category}-{key}"));
    Ok(hex::encode(digest))
}

/// Fetch the single row for `(owner, category, key)`.
///
/// The locator digest is used as both bounds of a one-row range query on the
/// hash index; hash collisions between distinct keys are the store's problem.
pub async fn lookup(
    rpc: &ChainRpc,
    contract: &str,
    owner: &str,
    category: u64,
    key: &str,
) -> Result<Record> {
    let hash = compute_locator(category, key)?;
    debug!(%owner, %key, category, %hash, "point lookup");
    let query = TableRowsQuery {
        json: true,
        code: contract.to_string(),
        scope: owner.to_string(),
        table: TABLE.to_string(),
        lower_bound: Some(hash.clone()),
        upper_bound: Some(hash),
        limit: 1,
        key_type: Some("sha256".to_string()),
        index_position: Some(2),
    };
    let page = rpc.get_table_rows(&query).await?;
    let row = page.rows.into_iter().next().ok_or(Error::NotFound {
        key: key.to_string(),
    })?;
    Ok(serde_json::from_value(row)?)
}

/// Lazily page through every row scoped to `owner`, in the store's native
/// ascending primary-key order. Each call restarts from the first page.
pub fn page_stream<'a>(
    rpc: &'a ChainRpc,
    contract: &'a str,
    owner: &'a str,
) -> impl Stream<Item = Result<Record>> + 'a {
    stream::try_unfold(
        (None::<String>, false),
        move |(cursor, done)| async move {
            if done {
                return Ok::<_, Error>(None);
            }
            let query = TableRowsQuery {
                json: true,
                code: contract.to_string(),
                scope: owner.to_string(),
                table: TABLE.to_string(),
                lower_bound: cursor,
                upper_bound: None,
                limit: PAGE_LIMIT,
                key_type: None,
                index_position: None,
            };
            let page = rpc.get_table_rows(&query).await?;
            debug!(rows = page.rows.len(), more = page.more, "table page");
            let records = page
                .rows
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<Record>, _>>()?;
            Ok(Some((records, (page.next_key, !page.more))))
        },
    )
    .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
    .try_flatten()
}

/// Collect the full pagination stream.
pub async fn fetch_all(rpc: &ChainRpc, contract: &str, owner: &str) -> Result<Vec<Record>> {
    page_stream(rpc, contract, owner).try_collect().await
}
