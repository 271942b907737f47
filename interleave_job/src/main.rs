use std::path::PathBuf;

use interleave_job::{schedule::rounds, JobConfig, Pipeline};

/// Every round is planned even when inputs have run out, so an absurd
/// target would plan millions of empty rounds.
const MAX_ROUNDS: usize = 100_000;

fn check_target(
    config: &JobConfig,
    input_count: usize,
    target_duration: f64,
) -> Result<(), String> {
    let rounds = rounds(config.chunk_length, input_count, target_duration);

    if rounds > MAX_ROUNDS {
        return Err(format!(
            "target of {target_duration}s needs {rounds} rounds, at most {MAX_ROUNDS} are allowed"
        ));
    }

    Ok(())
}

/**
 * This program interleaves a set of local video files into one output file.
 * Chunks are cut in a temporary directory that is removed when the program
 * exits, whether or not the job succeeded.
 */
#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    vi_app::init_tracing();

    // Read configuration from environment variables with figment
    let config: JobConfig = vi_app::load_config()?;

    // 1. parse the target duration, output path and inputs
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <target_seconds> <output> <input1> <input2> ...",
            args[0]
        );
        std::process::exit(1);
    }
    let target_duration: f64 = args[1].parse()?;
    let output = PathBuf::from(&args[2]);
    let inputs: Vec<PathBuf> = args[3..].iter().map(PathBuf::from).collect();
    check_target(&config, inputs.len(), target_duration)?;

    // 2. create the working directory for the intermediate chunks
    let work_dir = tempfile::tempdir()?;

    // 3. run the job
    let pipeline = Pipeline::from_config(&config);
    let report = pipeline
        .process(&inputs, target_duration, &output, work_dir.path())
        .await?;

    tracing::info!(
        "Wrote {} chunks ({}s) to {}",
        report.chunks,
        report.duration,
        report.output.display()
    );

    Ok(())
}
