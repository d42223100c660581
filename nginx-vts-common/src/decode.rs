use crate::error::{Error, Result};
use crate::status::StatusSnapshot;

/// Decode a raw VTS JSON document.
///
/// Missing sections and counters decode as zero; any type mismatch or
/// syntax error yields [`Error::MalformedStatusDocument`].
pub fn decode_status(data: &[u8]) -> Result<StatusSnapshot> {
    serde_json::from_slice(data).map_err(Error::from)
}
