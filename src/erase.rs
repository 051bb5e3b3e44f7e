//! Secure erase
//!
//! Overwrites every regular file under a target with three random passes
//! and one zero pass, syncing after each pass, then removes it. Directories
//! are removed once empty. Symlinks are removed without touching what they
//! point to.
//!
//! Nothing is written until the operator has typed the exact target path and
//! then the token `ERASE`.

use crate::error::{ProvisionError, Result};
use crate::prompt::{confirm_exact, Confirmer};
use crate::run_log::RunLog;
use rand::RngCore;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use walkdir::WalkDir;

pub const ERASE_TOKEN: &str = "ERASE";
pub const RANDOM_PASSES: usize = 3;
const CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EraseReport {
    pub files_erased: u64,
    pub bytes_overwritten: u64,
    pub directories_removed: u64,
}

/// Double-confirm, then erase `target` (a file or a directory tree).
///
/// # Errors
///
/// - `Validation` if the target does not exist or is the filesystem root
/// - `Cancelled` if either confirmation does not match; nothing is written
pub fn secure_erase(log: &RunLog, target: &Path, confirmer: &mut dyn Confirmer) -> Result<EraseReport> {
    let meta = fs::symlink_metadata(target).map_err(|e| {
        ProvisionError::validation(format!("cannot erase {}: {}", target.display(), e))
    })?;
    if target.parent().is_none() {
        return Err(ProvisionError::validation("refusing to erase the filesystem root"));
    }

    let expected_path = target.display().to_string();
    log.warning(format!(
        "About to irreversibly destroy {} ({})",
        expected_path,
        if meta.file_type().is_symlink() {
            "symlink"
        } else if meta.is_dir() {
            "directory"
        } else {
            "file"
        }
    ));
    if !confirm_exact(confirmer, "Type the full path to confirm:", &expected_path)? {
        log.info("Secure erase cancelled: path did not match");
        return Err(ProvisionError::cancelled("path confirmation did not match"));
    }
    if !confirm_exact(
        confirmer,
        &format!("Type {} to destroy it permanently:", ERASE_TOKEN),
        ERASE_TOKEN,
    )? {
        log.info("Secure erase cancelled: token did not match");
        return Err(ProvisionError::cancelled("erase token did not match"));
    }

    let mut report = EraseReport::default();
    if meta.file_type().is_symlink() {
        // the link itself is the target; whatever it points at is not
        fs::remove_file(target)?;
        log.success(format!("Removed symlink {}", expected_path));
        return Ok(report);
    }
    for entry in WalkDir::new(target)
        .follow_links(false)
        .follow_root_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|e| ProvisionError::Io(e.into()))?;
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::remove_dir(path)?;
            report.directories_removed += 1;
        } else if file_type.is_file() {
            report.bytes_overwritten += overwrite_file(path)?;
            fs::remove_file(path)?;
            report.files_erased += 1;
        } else {
            // symlinks, sockets, fifos: unlink only
            fs::remove_file(path)?;
        }
    }

    log.success(format!(
        "Erased {} file(s), {} bytes overwritten",
        report.files_erased, report.bytes_overwritten
    ));
    Ok(report)
}

/// Run every pass over one file. Returns bytes written per pass.
fn overwrite_file(path: &Path) -> Result<u64> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let mut rng = rand::thread_rng();
    let mut buf = vec![0u8; CHUNK];

    for _ in 0..RANDOM_PASSES {
        write_pass(&mut file, len, &mut buf, |chunk| rng.fill_bytes(chunk))?;
    }
    write_pass(&mut file, len, &mut buf, |chunk| chunk.fill(0))?;
    Ok(len)
}

fn write_pass(file: &mut File, len: u64, buf: &mut [u8], mut fill: impl FnMut(&mut [u8])) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        fill(&mut buf[..n]);
        file.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    file.sync_all()?;
    Ok(())
}
