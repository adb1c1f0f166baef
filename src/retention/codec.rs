//! Archive blob format and naming
//!
//! An archive is a JSON array of [`LogEntry`], optionally gzip-compressed.
//! Names follow `logs-archive-YYYYMMDD-HHMMSS-NNN.json[.gz]` in UTC, where
//! `NNN` tells apart batches written in the same second. Older names without
//! the sequence or time (`logs-archive-YYYYMMDD.json`) are still recognized.

use std::io::{Read, Write};

use chrono::{DateTime, NaiveDate, Utc};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::models::LogEntry;

pub const ARCHIVE_PREFIX: &str = "logs-archive-";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DATE_LEN: usize = 8;

/// Serialize a batch, gzipping it when `compress` is set
pub fn encode_archive(entries: &[LogEntry], compress: bool) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(entries)?;
    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(
        Vec::with_capacity((json.len() / 4).max(256)),
        Compression::default(),
    );
    encoder.write_all(&json)?;
    encoder.finish()
}

/// Inverse of [`encode_archive`]; compression is detected from the content
pub fn decode_archive(data: &[u8]) -> Result<Vec<LogEntry>, String> {
    if is_gzip(data) {
        let mut json = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut json)
            .map_err(|e| format!("gzip: {}", e))?;
        serde_json::from_slice(&json).map_err(|e| format!("json: {}", e))
    } else {
        serde_json::from_slice(data).map_err(|e| format!("json: {}", e))
    }
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

pub fn archive_filename(at: DateTime<Utc>, sequence: u64, compressed: bool) -> String {
    let mut name = format!(
        "{}{}-{:03}.json",
        ARCHIVE_PREFIX,
        at.format("%Y%m%d-%H%M%S"),
        sequence % 1000
    );
    if compressed {
        name.push_str(".gz");
    }
    name
}

/// Calendar date encoded in an archive name, if it follows the convention
pub fn parse_archive_date(filename: &str) -> Option<NaiveDate> {
    let base = filename.rsplit('/').next()?;
    let stamp = base.strip_prefix(ARCHIVE_PREFIX)?.get(..DATE_LEN)?;
    if !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()
}
