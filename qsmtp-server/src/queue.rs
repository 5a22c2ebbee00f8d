/*
 * qSMTP submission server
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/
use qsmtp_common::re::{anyhow, log};
use qsmtp_config::log_channel::QUEUE;

static LAST_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Nanoseconds since the epoch, strictly greater than any value previously
/// returned in this process.
fn next_id() -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));

    let mut prev = LAST_ID.load(std::sync::atomic::Ordering::SeqCst);
    loop {
        let id = std::cmp::max(now, prev.saturating_add(1));
        match LAST_ID.compare_exchange_weak(
            prev,
            id,
            std::sync::atomic::Ordering::SeqCst,
            std::sync::atomic::Ordering::SeqCst,
        ) {
            Ok(_) => return id,
            Err(actual) => prev = actual,
        }
    }
}

/// Directory receiving one `mail-<nanos>.eml` file per accepted message
///
/// The files are never read back nor removed by the server.
#[derive(Debug, Clone)]
pub struct MailQueue {
    dirpath: std::path::PathBuf,
}

impl MailQueue {
    ///
    #[must_use]
    pub fn new(dirpath: impl Into<std::path::PathBuf>) -> Self {
        Self {
            dirpath: dirpath.into(),
        }
    }

    ///
    #[must_use]
    pub fn dirpath(&self) -> &std::path::Path {
        &self.dirpath
    }

    /// Create the directory (and its parents) with mode `0755`,
    /// succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// * the directory cannot be created
    pub fn create_dir_if_missing(&self) -> std::io::Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o755);
        builder.create(&self.dirpath)
    }

    /// Write `body` as-is in a new file of the queue and return its path
    ///
    /// The content goes first to a hidden temporary file which is renamed once
    /// complete, so a reader of the directory never observes a partial message.
    ///
    /// # Errors
    ///
    /// * the temporary file cannot be created, written or renamed
    pub fn write(&self, body: &[u8]) -> anyhow::Result<std::path::PathBuf> {
        let id = next_id();
        let filepath = self.dirpath.join(format!("mail-{id}.eml"));
        let tmp_filepath = self.dirpath.join(format!(".mail-{id}.eml.tmp"));

        let result = Self::write_file(&tmp_filepath, body)
            .and_then(|()| std::fs::rename(&tmp_filepath, &filepath));

        if let Err(error) = result {
            if let Err(e) = std::fs::remove_file(&tmp_filepath) {
                log::trace!(target: QUEUE, "no temporary file to remove: {e}");
            }
            return Err(anyhow::Error::new(error).context(format!(
                "failed to write message to '{}'",
                filepath.display()
            )));
        }

        log::debug!(
            target: QUEUE,
            "{} bytes written to '{}'",
            body.len(),
            filepath.display()
        );

        Ok(filepath)
    }

    fn write_file(filepath: &std::path::Path, body: &[u8]) -> std::io::Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o644);

        let mut file = options.open(filepath)?;
        std::io::Write::write_all(&mut file, body)?;
        file.sync_all()
    }
}
