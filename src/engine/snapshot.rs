use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::limits::*;
use crate::model::{BookingRecord, PropertyRecord};

use super::EngineError;

pub const BOOKINGS_FILE: &str = "bookings.json";
pub const PROPERTIES_FILE: &str = "properties.json";

/// What a dataset file looked like when it was read. Missing files have no stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileStamp {
    pub fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Immutable view of one tenant's bookings and properties.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bookings: Arc<[BookingRecord]>,
    pub properties: Arc<[PropertyRecord]>,
    pub loaded_at: SystemTime,
    pub(super) stamps: [Option<FileStamp>; 2],
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::from_records(Vec::new(), Vec::new())
    }

    pub fn from_records(bookings: Vec<BookingRecord>, properties: Vec<PropertyRecord>) -> Self {
        Self {
            bookings: bookings.into(),
            properties: properties.into(),
            loaded_at: SystemTime::now(),
            stamps: [None, None],
        }
    }

    /// Read `bookings.json` and `properties.json` from `dir`. Missing files are empty.
    pub fn load(dir: &Path) -> Result<Self, EngineError> {
        let bookings_path = dir.join(BOOKINGS_FILE);
        let properties_path = dir.join(PROPERTIES_FILE);
        // Stamp before reading so a write racing the read shows up as stale next time.
        let stamps = [FileStamp::of(&bookings_path), FileStamp::of(&properties_path)];
        let bookings = read_array::<BookingRecord>(&bookings_path)?;
        let properties = read_array::<PropertyRecord>(&properties_path)?;
        Ok(Self {
            bookings: bookings.into(),
            properties: properties.into(),
            loaded_at: SystemTime::now(),
            stamps,
        })
    }

    /// True when either file changed, appeared or vanished since this snapshot was read.
    pub fn is_stale(&self, dir: &Path) -> bool {
        let current = [
            FileStamp::of(&dir.join(BOOKINGS_FILE)),
            FileStamp::of(&dir.join(PROPERTIES_FILE)),
        ];
        current != self.stamps
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EngineError> {
    let io_err = |e: std::io::Error| EngineError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };
    if meta.len() > MAX_SNAPSHOT_BYTES {
        return Err(EngineError::LimitExceeded("dataset file too large"));
    }
    let bytes = std::fs::read(path).map_err(io_err)?;
    decode_array(&bytes, path)
}

/// Decode a JSON array element by element.
///
/// A payload that is not an array counts as empty. Elements that do not decode are skipped,
/// so one bad record never hides the rest.
pub fn decode_array<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<Vec<T>, EngineError> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| EngineError::Decode {
        path: PathBuf::from(path),
        message: e.to_string(),
    })?;
    let serde_json::Value::Array(items) = value else {
        warn!("{}: expected a JSON array, treating as empty", path.display());
        return Ok(Vec::new());
    };
    if items.len() > MAX_RECORDS {
        return Err(EngineError::LimitExceeded("too many records"));
    }

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(record) => out.push(record),
            Err(e) => warn!("{}: skipping element {i}: {e}", path.display()),
        }
    }
    Ok(out)
}
