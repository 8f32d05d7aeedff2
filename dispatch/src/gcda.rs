//! Locates the profile-data file corresponding to the target object,
//! copies it to a temporary path, enqueues the path for cleanup, and hands
//! the staged path back to the orchestrator to stream.
//!
//! Active only when preprocessing-site=CLIENT and LTO-distribution is off.
//! Every failure here except an unusable tmpdir degrades quietly to "no
//! gcda" rather than failing the dispatch - see [`resolve_and_stage`].

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::cleanup::CleanupRegistry;
use crate::error::DispatchError;
use crate::path_mangle::mangle_path;

const COPY_BLOCK_SIZE: usize = 64 * 1024;

/// Scan the argument vector for `-fprofile-use` (bare) or
/// `-fprofile-use=PATH`. Returns `None` if absent, `Some(None)` for the bare
/// flag, `Some(Some(path))` for the `=PATH` form. The two forms are mutually
/// exclusive by construction - an argument can match at most one.
pub fn detect_profile_use(argv: &[String]) -> Option<Option<String>> {
    for arg in argv {
        if arg == "-fprofile-use" {
            return Some(None);
        }
        if let Some(rest) = arg.strip_prefix("-fprofile-use=") {
            return Some(Some(rest.to_string()));
        }
    }
    None
}

fn strip_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

/// Resolve the expected `.gcda` source path from the output object path, an
/// optional explicit `-fprofile-use=PATH` directory, and the current
/// working directory.
///
/// Without an explicit path the result sits alongside the object file,
/// preserving its directory structure (matching what the compiler itself
/// would look for). With an explicit path the stem is flattened with
/// [`mangle_path`] so it can live as a single file in that directory; when
/// the output object is itself absolute, no `cwd` component is prefixed.
pub fn resolve_gcda_path(output_object: &Path, explicit_path: Option<&str>, cwd: &Path) -> PathBuf {
    let stem = strip_extension(output_object);
    let is_absolute = output_object.is_absolute();

    match explicit_path {
        Some(path) if is_absolute => {
            Path::new(path).join(format!("{}.gcda", mangle_path(&stem)))
        }
        Some(path) => Path::new(path).join(format!(
            "{}#{}.gcda",
            mangle_path(cwd),
            mangle_path(&stem)
        )),
        None if is_absolute => {
            let mut name = stem.into_os_string();
            name.push(".gcda");
            PathBuf::from(name)
        }
        None => {
            let mut name = stem.into_os_string();
            name.push(".gcda");
            cwd.join(name)
        }
    }
}

/// Check that the process temporary directory exists and looks usable.
/// Unlike the rest of staging, failure here is a real (fatal to the
/// dispatch) I/O error rather than a silent degrade - there's no staging
/// path to even attempt without it.
pub fn guard_tmpdir() -> Result<PathBuf, DispatchError> {
    let dir = std::env::temp_dir();
    let meta = std::fs::metadata(&dir).map_err(DispatchError::Io)?;
    if !meta.is_dir() {
        return Err(DispatchError::Io(std::io::Error::other(
            "process temp directory is not a directory",
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = meta.permissions().mode();
        let writable_and_executable = mode & 0o300 == 0o300
            || mode & 0o030 == 0o030
            || mode & 0o003 == 0o003;
        if !writable_and_executable {
            return Err(DispatchError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "process temp directory is not writable and executable",
            )));
        }
    }
    Ok(dir)
}

#[derive(Debug, PartialEq, Eq)]
pub enum StagingOutcome {
    Staged(PathBuf),
    /// The source `.gcda` didn't exist, or staging failed for a reason
    /// other than an unusable tmpdir.
    Absent,
}

/// Stage `source` next to `preprocessed_source` (same directory, `.gcda`
/// extension) and register it for cleanup. Any failure other than an
/// unusable tmpdir degrades to [`StagingOutcome::Absent`].
pub async fn stage_gcda(
    source: &Path,
    preprocessed_source: &Path,
    registry: &dyn CleanupRegistry,
) -> Result<StagingOutcome, DispatchError> {
    guard_tmpdir()?;

    match try_stage(source, preprocessed_source, registry).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            tracing::debug!(
                %err,
                source = %source.display(),
                "gcda staging aborted, degrading to GCDA 0"
            );
            Ok(StagingOutcome::Absent)
        }
    }
}

async fn try_stage(
    source: &Path,
    preprocessed_source: &Path,
    registry: &dyn CleanupRegistry,
) -> Result<StagingOutcome, DispatchError> {
    let mut src_file = match tokio::fs::File::open(source).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StagingOutcome::Absent),
        Err(e) => return Err(DispatchError::Io(e)),
    };

    let (staging_path, mut dst_file) = create_staging_file(preprocessed_source).await?;
    copy_in_blocks(&mut src_file, &mut dst_file).await?;
    drop(dst_file);

    if registry.register(staging_path.clone()).is_err() {
        let _ = tokio::fs::remove_file(&staging_path).await;
        return Ok(StagingOutcome::Absent);
    }

    Ok(StagingOutcome::Staged(staging_path))
}

/// Create the staging file exclusively (`O_CREAT|O_EXCL`-equivalent), with
/// exactly one retry under a regenerated name if the first name is already
/// taken.
async fn create_staging_file(
    preprocessed_source: &Path,
) -> Result<(PathBuf, tokio::fs::File), DispatchError> {
    let primary = preprocessed_source.with_extension("gcda");
    match open_exclusive(&primary).await {
        Ok(file) => return Ok((primary, file)),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(DispatchError::Io(e)),
    }

    let suffix: u32 = rand::random();
    let retry = preprocessed_source.with_extension(format!("{suffix:08x}.gcda"));
    let file = open_exclusive(&retry).await.map_err(DispatchError::Io)?;
    Ok((retry, file))
}

async fn open_exclusive(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn copy_in_blocks<R, W>(reader: &mut R, writer: &mut W) -> Result<(), DispatchError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf).await.map_err(DispatchError::Io)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await.map_err(DispatchError::Io)?;
    }
    Ok(())
}

/// Detect, resolve, and stage in one call. Returns `None` when the
/// orchestrator should emit `GCDA 0` (no request, or staging degraded to
/// absent), `Some(path)` when it should emit `GCDA 1` followed by the
/// staged file.
pub async fn resolve_and_stage(
    argv: &[String],
    output_object: &Path,
    preprocessed_source: &Path,
    cwd: &Path,
    registry: &dyn CleanupRegistry,
) -> Result<Option<PathBuf>, DispatchError> {
    let Some(explicit) = detect_profile_use(argv) else {
        return Ok(None);
    };
    let source = resolve_gcda_path(output_object, explicit.as_deref(), cwd);
    match stage_gcda(&source, preprocessed_source, registry).await? {
        StagingOutcome::Staged(path) => Ok(Some(path)),
        StagingOutcome::Absent => Ok(None),
    }
}
