//! On-disk record format
//!
//! ```text
//! [magic: 4 bytes "IVTC"]
//! [version: u32 LE]
//! [timestamp: f64 LE, source mtime in seconds since the epoch]
//! [thumbnail length: u64 LE]
//! [thumbnail bytes]
//! [property table: JSON object, to end of file]
//! ```

use std::fs::Metadata;
use std::io::Read;
use std::time::UNIX_EPOCH;

use imgview_decode::PropertyTable;

/// File signature of a record
pub const MAGIC: [u8; 4] = *b"IVTC";

/// Current record layout version
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum allowed difference between a record's timestamp and its
/// source's modification time, in seconds
const FRESHNESS_TOLERANCE: f64 = 1.0;

const HEADER_LEN: usize = 4 + 4 + 8 + 8;

/// A record that could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record is truncated")]
    Truncated,
    #[error("record has an unknown signature")]
    BadMagic,
    #[error("record schema version {0} is not supported")]
    UnsupportedVersion(u32),
    #[error("property table is malformed: {0}")]
    PropertyTable(#[from] serde_json::Error),
}

/// The persisted unit: a thumbnail plus metadata about its source
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCacheRecord {
    /// Source modification time when the thumbnail was generated
    pub timestamp: f64,

    /// Encoded thumbnail (JPEG or PNG)
    pub thumbnail: Vec<u8>,

    /// Serialized property table
    pub property_bytes: Vec<u8>,
}

impl MetadataCacheRecord {
    /// Build a record, serializing `properties`
    pub fn new(
        timestamp: f64,
        thumbnail: Vec<u8>,
        properties: &PropertyTable,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            timestamp,
            thumbnail,
            property_bytes: serde_json::to_vec(properties)?,
        })
    }

    /// Serialize to the on-disk layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.thumbnail.len() + self.property_bytes.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&(self.thumbnail.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.thumbnail);
        out.extend_from_slice(&self.property_bytes);
        out
    }

    /// Parse the on-disk layout
    ///
    /// Rejects records with a foreign signature or another schema version.
    pub fn decode(mut data: &[u8]) -> Result<Self, RecordError> {
        let mut magic = [0u8; 4];
        read_exact(&mut data, &mut magic)?;
        if magic != MAGIC {
            return Err(RecordError::BadMagic);
        }

        let mut word = [0u8; 4];
        read_exact(&mut data, &mut word)?;
        let version = u32::from_le_bytes(word);
        if version != SCHEMA_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }

        let mut long = [0u8; 8];
        read_exact(&mut data, &mut long)?;
        let timestamp = f64::from_le_bytes(long);

        read_exact(&mut data, &mut long)?;
        let thumbnail_len =
            usize::try_from(u64::from_le_bytes(long)).map_err(|_| RecordError::Truncated)?;
        if thumbnail_len > data.len() {
            return Err(RecordError::Truncated);
        }

        let (thumbnail, property_bytes) = data.split_at(thumbnail_len);
        Ok(Self {
            timestamp,
            thumbnail: thumbnail.to_vec(),
            property_bytes: property_bytes.to_vec(),
        })
    }

    /// Parse the property table
    ///
    /// An empty property section is an empty table.
    pub fn properties(&self) -> Result<PropertyTable, RecordError> {
        if self.property_bytes.is_empty() {
            return Ok(PropertyTable::new());
        }
        Ok(serde_json::from_slice(&self.property_bytes)?)
    }

    /// Returns true if the record was generated from a source whose
    /// modification time is `source_timestamp`
    pub fn is_fresh(&self, source_timestamp: f64) -> bool {
        (source_timestamp - self.timestamp).abs() < FRESHNESS_TOLERANCE
    }

    /// Size of the encoded record in bytes
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.thumbnail.len() + self.property_bytes.len()
    }
}

fn read_exact(data: &mut &[u8], buf: &mut [u8]) -> Result<(), RecordError> {
    data.read_exact(buf).map_err(|_| RecordError::Truncated)
}

/// Modification time of a file in seconds since the epoch
///
/// Returns `None` on platforms or filesystems that do not report it.
pub fn modification_timestamp(metadata: &Metadata) -> Option<f64> {
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_secs_f64())
}
