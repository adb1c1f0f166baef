//! Key layout for the Fjall partitions
//!
//! Partition structure:
//! - `entries`: log:{timestamp_ms:020}:{id:020} -> LogEntry (JSON)
//! - `metadata`: meta:{key} -> value
//!
//! Zero-padded timestamps make lexical key order equal to chronological
//! order, so "older than cutoff" is a plain range scan up to `encode_cutoff`.
use chrono::{DateTime, Utc};

const ENTRY_PREFIX: &str = "log:";

/// Milliseconds since epoch, clamped at zero for pre-1970 timestamps
pub fn timestamp_ms(ts: &DateTime<Utc>) -> u64 {
    ts.timestamp_millis().max(0) as u64
}

/// Encode an entry key: log:{timestamp_ms:020}:{id:020}
pub fn encode_entry_key(ts: &DateTime<Utc>, id: u64) -> Vec<u8> {
    format!("{}{:020}:{:020}", ENTRY_PREFIX, timestamp_ms(ts), id).into_bytes()
}

/// Exclusive upper bound for entries strictly older than `cutoff`
pub fn encode_cutoff(cutoff: &DateTime<Utc>) -> Vec<u8> {
    format!("{}{:020}:", ENTRY_PREFIX, timestamp_ms(cutoff)).into_bytes()
}

/// Lower bound of the entry keyspace
pub fn entry_prefix() -> &'static [u8] {
    ENTRY_PREFIX.as_bytes()
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_key_encoding() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let key = encode_entry_key(&ts, 42);
        assert_eq!(key, b"log:00000001700000000123:00000000000000000042");
    }

    #[test]
    fn test_cutoff_sorts_between_older_and_newer_keys() {
        let older = Utc.timestamp_millis_opt(999).unwrap();
        let cutoff = Utc.timestamp_millis_opt(1000).unwrap();

        let cutoff_key = encode_cutoff(&cutoff);
        assert!(encode_entry_key(&older, u64::MAX) < cutoff_key);
        assert!(encode_entry_key(&cutoff, 0) > cutoff_key);
    }

    #[test]
    fn test_pre_epoch_timestamps_clamp() {
        let ts = Utc.timestamp_millis_opt(-5_000).unwrap();
        assert_eq!(timestamp_ms(&ts), 0);
    }

    #[test]
    fn test_meta_key_encoding() {
        assert_eq!(encode_meta_key("next_id"), b"meta:next_id");
    }
}
