//! Tar stream unpacking for files copied out of a container.
//!
//! `tar cf - /var/pm/dump.csv` inside the container writes entries without
//! the leading `/`. Entries are matched against that prefix, the prefix is
//! stripped and the remainder is placed under the destination path; a single
//! file therefore lands exactly at the destination.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

use crate::error::PmError;

/// In-process pipe capacity between the exec stream and the unpacker.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Entry-name prefix produced by `tar` for a remote source path.
pub fn archive_prefix(source: &str) -> String {
    source.trim_start_matches('/').trim_end_matches('/').to_string()
}

/// Local path a remote source is unpacked to: `<dest_dir>/<basename>`.
pub fn destination_for(source: &str, dest_dir: &Path) -> Result<PathBuf, PmError> {
    let prefix = archive_prefix(source);
    let base = Path::new(&prefix)
        .file_name()
        .ok_or_else(|| PmError::remote(source, "remote path has no file name"))?;
    Ok(dest_dir.join(base))
}

/// Unpacks the entries of `reader` that live under `prefix` into `dest`.
///
/// Fails when an entry would escape `dest` or when no regular file was
/// written. The reader is drained to EOF after the end-of-archive marker,
/// since `tar` pads its output to a full record.
pub fn unpack_archive<R: Read>(reader: R, dest: &Path, prefix: &str) -> Result<PathBuf, PmError> {
    let prefix = archive_prefix(prefix);
    let mut archive = tar::Archive::new(reader);
    let mut files = 0usize;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let name = name.trim_start_matches('/');

        let Some(rest) = name.strip_prefix(prefix.as_str()) else {
            debug!(entry = name, "Entry outside requested path skipped");
            continue;
        };
        if !(rest.is_empty() || rest.starts_with('/')) {
            debug!(entry = name, "Entry shares prefix but not path, skipped");
            continue;
        }

        let relative = Path::new(rest.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PmError::Read {
                path: dest.to_path_buf(),
                reason: format!("archive entry '{name}' escapes the destination"),
            });
        }
        let target = if relative.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(relative)
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if !entry_type.is_file() {
            warn!(entry = name, "Unsupported archive entry type skipped");
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
        files += 1;
    }

    let padding = std::io::copy(&mut archive.into_inner(), &mut std::io::sink())?;
    debug!(padding, "Trailing archive bytes drained");

    if files == 0 {
        return Err(PmError::Read {
            path: dest.to_path_buf(),
            reason: "archive contained no regular file".to_string(),
        });
    }
    Ok(dest.to_path_buf())
}

/// Pumps an async tar stream through an in-process pipe into the
/// synchronous unpacker.
///
/// The producer task owns the write end and always closes it, so the
/// consumer sees EOF even when the source fails midway. If the consumer
/// stops early the producer's writes fail and it terminates as well; the
/// consumer's error is then the one reported.
pub async fn stream_unpack<S>(stream: S, dest: PathBuf, prefix: String) -> Result<PathBuf, PmError>
where
    S: AsyncRead + Send + Unpin + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    let producer = tokio::spawn(async move {
        let mut stream = stream;
        let copied = tokio::io::copy(&mut stream, &mut writer).await;
        let _ = writer.shutdown().await;
        drop(writer);
        copied
    });

    let bridge = SyncIoBridge::new(reader);
    let consumer = tokio::task::spawn_blocking(move || unpack_archive(bridge, &dest, &prefix));

    let unpacked = consumer
        .await
        .map_err(|e| PmError::Io(std::io::Error::other(e)))?;
    let copied = producer
        .await
        .map_err(|e| PmError::Io(std::io::Error::other(e)))?;

    match (copied, unpacked) {
        (_, Err(e)) => Err(e),
        (Ok(bytes), Ok(path)) => {
            debug!(bytes, "Archive stream drained");
            Ok(path)
        }
        (Err(e), Ok(path)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(error = %e, "Producer stopped after the archive was unpacked");
            Ok(path)
        }
        (Err(e), Ok(_)) => Err(PmError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_destination_for() {
        let dest = destination_for("/home/vsm/pm/performanceData_1.csv", Path::new("/data")).unwrap();
        assert_eq!(dest, PathBuf::from("/data/performanceData_1.csv"));
        assert!(destination_for("/", Path::new("/data")).is_err());
    }

    #[test]
    fn test_single_file_lands_at_destination() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_with(&[("home/vsm/pm/performanceData_1.csv", b"a,b\n")]);
        let dest = dir.path().join("performanceData_1.csv");

        let out = unpack_archive(archive.as_slice(), &dest, "/home/vsm/pm/performanceData_1.csv").unwrap();

        assert_eq!(out, dest);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "a,b\n");
    }

    #[test]
    fn test_entries_outside_prefix_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_with(&[
            ("var/pm/other.csv", b"x"),
            ("var/pm/dump.csv.bak", b"y"),
            ("var/pm/dump.csv", b"z"),
        ]);
        let dest = dir.path().join("dump.csv");

        unpack_archive(archive.as_slice(), &dest, "var/pm/dump.csv").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "z");
        assert!(!dir.path().join("other.csv").exists());
    }

    #[test]
    fn test_archive_without_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_with(&[]);
        let err = unpack_archive(archive.as_slice(), &dir.path().join("x.csv"), "/x.csv").unwrap_err();
        assert_eq!(err.kind(), "read");
    }

    #[tokio::test]
    async fn test_stream_unpack_through_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![b'7'; 200 * 1024];
        let archive = tar_with(&[("var/pm/big.csv", payload.as_slice())]);
        let dest = dir.path().join("big.csv");

        let out = stream_unpack(std::io::Cursor::new(archive), dest.clone(), "/var/pm/big.csv".into())
            .await
            .unwrap();

        assert_eq!(out, dest);
        assert_eq!(fs::metadata(&dest).unwrap().len(), payload.len() as u64);
    }

    #[tokio::test]
    async fn test_stream_unpack_tolerates_late_record_padding() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_with(&[("var/pm/dump.csv", b"1,2,3\n")]);
        let dest = dir.path().join("dump.csv");

        let (source, mut remote) = tokio::io::duplex(1024);
        let sender = tokio::spawn(async move {
            remote.write_all(&archive).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            remote.write_all(&[0u8; 8 * 1024]).await.unwrap();
            remote.shutdown().await.unwrap();
        });

        let out = stream_unpack(source, dest.clone(), "/var/pm/dump.csv".into())
            .await
            .unwrap();
        sender.await.unwrap();

        assert_eq!(out, dest);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "1,2,3\n");
    }

    #[tokio::test]
    async fn test_stream_unpack_reports_unpack_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_with(&[("var/pm/other.csv", b"x")]);
        let err = stream_unpack(
            std::io::Cursor::new(archive),
            dir.path().join("dump.csv"),
            "/var/pm/dump.csv".into(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "read");
    }

    #[tokio::test]
    async fn test_stream_unpack_garbage_fails_without_hanging() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = vec![0xAAu8; 300 * 1024];
        let result = stream_unpack(
            std::io::Cursor::new(garbage),
            dir.path().join("x.csv"),
            "x.csv".into(),
        )
        .await;
        assert!(result.is_err());
    }
}
