//! Turning host paths into names stored in the root directory.

use std::path::Path;

use crate::config::*;
use crate::error::{FsError, Result};

/// Strips the directory prefix of a host path, returning the raw name bytes.
pub fn base_name(path: &Path) -> Result<&[u8]> {
    match path.file_name() {
        Some(name) => Ok(name.as_encoded_bytes()),
        None => Err(FsError::InvalidName(path.display().to_string())),
    }
}

/// Checks a name fits the entry's name field with room for a terminator.
pub fn validate_name(name: &[u8]) -> Result<()> {
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(FsError::NameTooLong {
            len: name.len(),
            max: MAX_FILE_NAME_LEN,
        });
    }
    if name.is_empty() || name == DOT_NAME || name == DOTDOT_NAME || name.contains(&b'/') || name.contains(&0) {
        return Err(FsError::InvalidName(String::from_utf8_lossy(name).into_owned()));
    }
    Ok(())
}
