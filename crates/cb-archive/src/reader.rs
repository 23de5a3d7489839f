//! Opening and validating an uploaded archive.

use std::io::{Read, Seek};

use cb_core::models::BoardType;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::metadata::{ArchiveMetadata, METADATA_ENTRY};

/// A validated archive: its parsed metadata plus access to file entries.
pub struct OpenedArchive<R: Read + Seek> {
    pub metadata: ArchiveMetadata,
    pub files: ArchiveFiles<R>,
}

pub struct ArchiveFiles<R: Read + Seek> {
    zip: ZipArchive<R>,
}

/// Parses the archive and checks it was exported from `expected`.
///
/// Nothing is written anywhere; a returned error leaves all state as it was.
pub fn open_archive<R: Read + Seek>(reader: R, expected: &BoardType) -> Result<OpenedArchive<R>, ArchiveError> {
    let mut zip = ZipArchive::new(reader)?;

    let metadata: ArchiveMetadata = match zip.by_name(METADATA_ENTRY) {
        Ok(entry) => serde_json::from_reader(entry)?,
        Err(ZipError::FileNotFound) => return Err(ArchiveError::MissingMetadata),
        Err(e) => return Err(e.into()),
    };

    if !metadata.kind.eq_ignore_ascii_case(expected.as_str()) {
        return Err(ArchiveError::TypeMismatch { expected: expected.to_string(), found: metadata.kind });
    }
    log::debug!(
        "opened {} archive v{} exported {} with {} posts",
        metadata.kind,
        metadata.version,
        metadata.exported_at,
        metadata.posts.len()
    );

    Ok(OpenedArchive { metadata, files: ArchiveFiles { zip } })
}

impl<R: Read + Seek> ArchiveFiles<R> {
    /// Bytes of the entry at `path`, or `None` if the archive lacks it.
    pub fn read(&mut self, path: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let mut entry = match self.zip.by_name(path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut data)?;
        Ok(Some(data))
    }
}
