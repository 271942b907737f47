use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::{runner::run, Error, Toolchain};

/// Where the concat manifest for `output` is written: next to it, named
/// `<stem>_concat.txt`.
pub fn manifest_path(output: &Path) -> PathBuf {
    let stem = output.file_stem().map_or_else(
        || "output".to_string(),
        |stem| stem.to_string_lossy().to_string(),
    );

    output.with_file_name(format!("{stem}_concat.txt"))
}

/// Renders the manifest read by ffmpeg's concat demuxer: one
/// `file '<absolute path>'` line per segment, in playback order.
///
/// Quotes inside paths are not escaped.
///
/// # Errors
/// Fails if a relative path cannot be made absolute.
pub fn render_manifest(segments: &[PathBuf]) -> Result<String, Error> {
    segments
        .iter()
        .map(|segment| {
            std::path::absolute(segment)
                .map(|path| format!("file '{}'\n", path.display()))
                .map_err(Error::from)
        })
        .collect()
}

pub fn build_concat_command(
    toolchain: &Toolchain,
    manifest: &Path,
    output: &Path,
) -> Command {
    let mut cmd = toolchain.ffmpeg_command();

    cmd.arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(manifest);
    cmd.arg("-c").arg("copy");
    cmd.arg(output);

    cmd
}

/// Joins `segments` into `output` with the concat demuxer and stream copy.
///
/// The manifest is removed afterwards whether or not ffmpeg succeeded.
///
/// # Errors
/// Fails if the manifest cannot be written or ffmpeg rejects a segment
/// (unreadable, or codec parameters that do not match).
#[tracing::instrument(skip(toolchain, segments), fields(count = segments.len()))]
pub async fn concat(
    toolchain: &Toolchain,
    segments: &[PathBuf],
    output: &Path,
) -> Result<(), Error> {
    if segments.is_empty() {
        return Err(Error::NoSegments);
    }

    let manifest = manifest_path(output);
    let contents = render_manifest(segments)?;

    let result = match tokio::fs::write(&manifest, contents).await {
        Ok(()) => run(
            build_concat_command(toolchain, &manifest, output),
            toolchain.timeout,
        )
        .await
        .map(|_| ()),
        Err(e) => Err(Error::Io(e)),
    };

    if let Err(e) = tokio::fs::remove_file(&manifest).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                "Could not remove concat manifest {}: {}",
                manifest.display(),
                e
            );
        }
    }

    result?;

    tracing::info!(
        "Concatenated {} chunks to {}",
        segments.len(),
        output.display()
    );

    Ok(())
}
