use std::path::Path;

use tokio::process::Command;

use crate::{runner::run, Error, Toolchain};

/// Builds the ffmpeg command that copies `length` seconds of every stream
/// in `input`, starting at `start`, into `output`.
///
/// Timestamps of the result are shifted so that it starts at zero
/// (`-avoid_negative_ts make_zero`), and an existing `output` is replaced.
pub fn build_trim_command(
    toolchain: &Toolchain,
    input: &Path,
    start: f64,
    length: f64,
    output: &Path,
) -> Command {
    let mut cmd = toolchain.ffmpeg_command();

    cmd.arg("-ss")
        .arg(start.to_string())
        .arg("-t")
        .arg(length.to_string())
        .arg("-i")
        .arg(input);
    cmd.arg("-c").arg("copy");
    cmd.arg("-avoid_negative_ts").arg("make_zero");
    cmd.arg(output);

    cmd
}

/// Cuts one segment out of `input` without re-encoding.
///
/// # Errors
/// Fails with the ffmpeg diagnostic when the source cannot be seeked or
/// copied at the requested offset.
#[tracing::instrument(skip(toolchain))]
pub async fn trim(
    toolchain: &Toolchain,
    input: &Path,
    start: f64,
    length: f64,
    output: &Path,
) -> Result<(), Error> {
    run(
        build_trim_command(toolchain, input, start, length, output),
        toolchain.timeout,
    )
    .await?;

    tracing::info!("Created chunk: {}", output.display());

    Ok(())
}
