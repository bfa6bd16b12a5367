/*
 * SHA256 helpers used to recognise a texture that is already present at its
 * destination, so relinking can skip the copy and still point the scene at it.
 */
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

/*
 * Calculates the SHA256 checksum of a file as a lowercase hex string.
 * The file is streamed through the hasher, so texture size does not matter.
 */
pub fn calculate_sha256_checksum(file_path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(file_path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    let checksum = format!("{:x}", hasher.finalize());
    log::trace!("ChecksumUtils: {file_path:?} has checksum {checksum}");
    Ok(checksum)
}

// True when both files exist with identical content. Sizes are compared first.
pub fn files_have_same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(calculate_sha256_checksum(a)? == calculate_sha256_checksum(b)?)
}
