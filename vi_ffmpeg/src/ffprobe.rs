use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use crate::{runner::run, Error, Toolchain};

/*
Trimmed ffprobe output for an mp4 recording. Matroska files carry no
per-stream `duration`, only a `DURATION` tag, so the container duration is
used as a fallback.
{
    "streams": [
        {
            "index": 0,
            "codec_name": "h264",
            "codec_type": "video",
            "start_time": "0.000000",
            "duration": "20.000000"
        },
        {
            "index": 1,
            "codec_name": "aac",
            "codec_type": "audio",
            "start_time": "0.000000",
            "duration": "20.021333"
        }
    ],
    "format": {
        "filename": "video_0.mp4",
        "nb_streams": 2,
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "start_time": "0.000000",
        "duration": "20.021333"
    }
}
*/

fn str_to_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(s.and_then(|s| s.parse::<f64>().ok()))
}

#[derive(Debug, Deserialize)]
pub struct FFProbeStream {
    pub index: u32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub start_time: Option<String>,
    #[serde(default)]
    #[serde(deserialize_with = "str_to_f64")]
    pub duration: Option<f64>,
    pub tags: Option<FFProbeTags>,
}

#[derive(Debug, Deserialize)]
pub struct FFProbeTags {
    #[serde(rename = "DURATION")]
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FFProbeFormat {
    pub filename: Option<String>,
    pub nb_streams: Option<u32>,
    pub format_name: Option<String>,
    #[serde(default)]
    #[serde(deserialize_with = "str_to_f64")]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct FFProbeOutput {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    pub format: Option<FFProbeFormat>,
}

impl FFProbeOutput {
    /// Playable duration in seconds: the first stream's duration, or the
    /// container duration when the stream does not report one. Only finite,
    /// positive values count.
    pub fn playable_duration(&self) -> Option<f64> {
        self.streams
            .first()
            .and_then(|stream| stream.duration)
            .filter(|duration| duration.is_finite() && *duration > 0.0)
            .or_else(|| {
                self.format
                    .as_ref()
                    .and_then(|format| format.duration)
                    .filter(|duration| duration.is_finite() && *duration > 0.0)
            })
    }
}

/// Runs ffprobe against a media file and parses its JSON report.
///
/// # Errors
/// Fails if ffprobe cannot be spawned, exits unsuccessfully (unreadable or
/// corrupt file), times out, or prints something that is not valid JSON.
pub async fn probe(
    toolchain: &Toolchain,
    path: &Path,
) -> Result<FFProbeOutput, Error> {
    tracing::info!("Probing {}", path.display());

    let mut command = Command::new(&toolchain.ffprobe);
    command
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path);

    let output = run(command, toolchain.timeout).await?;

    let output = String::from_utf8_lossy(&output.stdout);

    match serde_json::from_str(&output) {
        Ok(output) => Ok(output),
        Err(err) => {
            tracing::error!("Failed to parse ffprobe output: {}", err);
            Err(Error::Parse(err))
        }
    }
}

/// Reports the playable duration of a media file, in seconds.
///
/// # Errors
/// Everything [`probe`] can fail with, plus [`Error::NoStreams`] and
/// [`Error::MissingDuration`] when the report has nothing usable.
pub async fn duration(toolchain: &Toolchain, path: &Path) -> Result<f64, Error> {
    let output = probe(toolchain, path).await?;

    if output.streams.is_empty() {
        return Err(Error::NoStreams(path.display().to_string()));
    }

    output
        .playable_duration()
        .ok_or_else(|| Error::MissingDuration(path.display().to_string()))
}
