use std::{
    process::{Output, Stdio},
    time::Duration,
};

use tokio::process::Command;

use crate::Error;

/// Runs a prepared command to completion and captures its output.
///
/// A non-zero exit status is turned into [`Error::Failed`] carrying the
/// trimmed stderr. When `deadline` elapses first the child is killed.
pub async fn run(
    mut command: Command,
    deadline: Option<Duration>,
) -> Result<Output, Error> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .to_string();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = match deadline {
        Some(after) => {
            if let Ok(result) =
                tokio::time::timeout(after, command.output()).await
            {
                result
            } else {
                tracing::error!("{program} timed out after {after:?}");
                return Err(Error::Timeout { program, after });
            }
        }
        None => command.output().await,
    };

    let output = match result {
        Ok(output) => output,
        Err(source) => {
            tracing::error!("Failed to spawn {program}: {source}");
            return Err(Error::Spawn { program, source });
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        tracing::error!("{program} error: {stderr}");
        return Err(Error::Failed {
            program,
            status: output.status,
            stderr,
        });
    }

    tracing::trace!("{program} output: {stderr}");

    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;
    use tokio::process::Command;

    use super::run;
    use crate::Error;

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_failure_carries_trimmed_stderr() {
        let result = run(shell("echo '  Error while seeking ' >&2; exit 1"), None).await;

        match result {
            Err(Error::Failed {
                program,
                status,
                stderr,
            }) => {
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(1));
                assert_eq!(stderr, "Error while seeking");
            }
            other => panic!("expected a failed run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_returns_output() {
        let output = run(shell("echo '{}'; echo noise >&2"), None).await.unwrap();

        assert_eq!(String::from_utf8_lossy(&output.stdout), "{}\n");
    }

    #[tokio::test]
    async fn test_deadline_kills_the_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");

        let started = Instant::now();
        let result = run(cmd, Some(Duration::from_millis(200))).await;

        assert!(matches!(
            result,
            Err(Error::Timeout { ref program, after })
                if program == "sleep" && after == Duration::from_millis(200)
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
