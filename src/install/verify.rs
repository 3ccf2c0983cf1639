//! Artifact unpacking and verification
//!
//! Checks run on the staged artifact before it is moved into place:
//! - SHA-256 against a published checksum list (when available)
//! - non-empty executable with the target platform's binary magic
//! - executable permission bits on Unix

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::core::error::{CoreError, Result};
use crate::release::ArchiveKind;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const MACHO_MAGICS: [[u8; 4]; 5] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
    [0xca, 0xfe, 0xba, 0xbe],
];
const PE_MAGIC: [u8; 2] = [b'M', b'Z'];

/// Calculate SHA256 checksum of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| CoreError::InstallIo(e.to_string()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| CoreError::InstallIo(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Find the expected checksum of `asset_name` in a `sha256sum`-style list
///
/// Accepts `<hash>  <name>`, `<hash> *<name>` and a bare `<hash>` line.
pub fn expected_checksum(list: &str, asset_name: &str) -> Option<String> {
    let mut bare = None;
    for line in list.lines() {
        let mut parts = line.split_whitespace();
        let Some(hash) = parts.next() else {
            continue;
        };
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        match parts.next() {
            Some(name) if name.trim_start_matches('*') == asset_name => {
                return Some(hash.to_ascii_lowercase());
            }
            None => bare = Some(hash.to_ascii_lowercase()),
            _ => {}
        }
    }
    bare
}

/// Compare a file's SHA256 with the expected value
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(CoreError::VerificationFailed(format!(
            "checksum mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

/// Produce the executable at `dest` from a downloaded asset
pub fn unpack(source: &Path, kind: ArchiveKind, binary_name: &str, dest: &Path) -> Result<()> {
    match kind {
        ArchiveKind::Raw => {
            std::fs::rename(source, dest).map_err(|e| CoreError::InstallIo(e.to_string()))?;
        }
        ArchiveKind::Gzip => {
            let input = File::open(source).map_err(|e| CoreError::InstallIo(e.to_string()))?;
            let mut decoder = flate2::read::GzDecoder::new(input);
            let mut output = File::create(dest).map_err(|e| CoreError::InstallIo(e.to_string()))?;
            std::io::copy(&mut decoder, &mut output).map_err(|e| {
                CoreError::VerificationFailed(format!("corrupt gzip archive: {}", e))
            })?;
            output.flush().map_err(|e| CoreError::InstallIo(e.to_string()))?;
        }
        ArchiveKind::Zip => {
            let input = File::open(source).map_err(|e| CoreError::InstallIo(e.to_string()))?;
            let mut archive = zip::ZipArchive::new(input)
                .map_err(|e| CoreError::VerificationFailed(format!("corrupt zip archive: {}", e)))?;

            let index = find_zip_entry(&mut archive, binary_name)?;
            let mut entry = archive
                .by_index(index)
                .map_err(|e| CoreError::VerificationFailed(format!("corrupt zip archive: {}", e)))?;
            let mut output = File::create(dest).map_err(|e| CoreError::InstallIo(e.to_string()))?;
            std::io::copy(&mut entry, &mut output).map_err(|e| {
                CoreError::VerificationFailed(format!("corrupt zip entry: {}", e))
            })?;
            output.flush().map_err(|e| CoreError::InstallIo(e.to_string()))?;
        }
    }
    Ok(())
}

/// Pick the archive entry holding the executable
///
/// Prefers an entry named like the binary; a single-file archive is accepted
/// whatever its entry name.
fn find_zip_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    binary_name: &str,
) -> Result<usize> {
    let mut files = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| CoreError::VerificationFailed(format!("corrupt zip archive: {}", e)))?;
        if !entry.is_file() {
            continue;
        }
        let base = entry
            .name()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        if base.eq_ignore_ascii_case(binary_name) {
            return Ok(index);
        }
        files.push(index);
    }

    match files.as_slice() {
        [only] => Ok(*only),
        _ => Err(CoreError::VerificationFailed(format!(
            "archive does not contain {}",
            binary_name
        ))),
    }
}

/// Check the artifact is a non-empty executable for the target OS
pub fn verify_executable(path: &Path, target_os: &str) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| CoreError::InstallIo(e.to_string()))?;
    if metadata.len() == 0 {
        return Err(CoreError::VerificationFailed("downloaded artifact is empty".to_string()));
    }

    let mut header = [0u8; 4];
    let mut file = File::open(path).map_err(|e| CoreError::InstallIo(e.to_string()))?;
    let read = file
        .read(&mut header)
        .map_err(|e| CoreError::InstallIo(e.to_string()))?;
    let header = &header[..read];

    let well_formed = match target_os {
        "windows" => header.starts_with(&PE_MAGIC),
        "darwin" | "macos" => MACHO_MAGICS.iter().any(|m| header == m),
        _ => header == ELF_MAGIC,
    };
    if !well_formed {
        return Err(CoreError::VerificationFailed(format!(
            "artifact is not a {} executable",
            target_os
        )));
    }

    mark_executable(path)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| CoreError::InstallIo(e.to_string()))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| CoreError::InstallIo(e.to_string()))?;

    let mode = std::fs::metadata(path)
        .map_err(|e| CoreError::InstallIo(e.to_string()))?
        .permissions()
        .mode();
    if mode & 0o111 == 0 {
        return Err(CoreError::VerificationFailed("artifact is not executable".to_string()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
