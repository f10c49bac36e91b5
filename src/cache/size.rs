//! Best-effort payload size estimation.

use serde::Serialize;

/// Size assumed when a payload cannot be serialized.
pub const DEFAULT_ENTRY_SIZE: usize = 1024;

/// Serialized JSON length of `value`, or [`DEFAULT_ENTRY_SIZE`] on failure.
pub fn estimate_size<T: Serialize + ?Sized>(value: &T) -> usize {
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes.len(),
        Err(e) => {
            tracing::debug!(target: "fetch_cache::size", error = %e, "size estimation fell back to default");
            DEFAULT_ENTRY_SIZE
        }
    }
}
