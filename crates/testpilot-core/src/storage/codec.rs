//! JSON row encoding shared by the typed wrappers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use testpilot_storage::SimpleStorage;

pub(crate) fn put<S: SimpleStorage, T: Serialize>(
    inner: &S,
    id: &str,
    created_at: &DateTime<Utc>,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_vec(value)?;
    inner.put_raw(id, created_at.timestamp_millis(), &json)
}

pub(crate) fn get<S: SimpleStorage, T: DeserializeOwned>(inner: &S, id: &str) -> Result<Option<T>> {
    match inner.get_raw(id)? {
        Some(bytes) => Ok(Some(
            serde_json::from_slice(&bytes).with_context(|| format!("Corrupt row {id}"))?,
        )),
        None => Ok(None),
    }
}

/// All rows, newest first.
pub(crate) fn list<S: SimpleStorage, T: DeserializeOwned>(inner: &S) -> Result<Vec<T>> {
    inner
        .list_raw()?
        .into_iter()
        .map(|(id, bytes)| {
            serde_json::from_slice(&bytes).with_context(|| format!("Corrupt row {id}"))
        })
        .collect()
}
