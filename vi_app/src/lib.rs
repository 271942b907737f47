use figment::{Figment, providers::Env};
use serde::{Deserialize, de::DeserializeOwned};

pub trait ContextProvider<Config> {
    fn new(config: Config) -> impl Future<Output = Self>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingConfig {
    #[serde(default)]
    log_format: LogFormat,
}

fn figment() -> Figment {
    Figment::new().merge(Env::raw())
}

/// Extracts a configuration struct from environment variables.
///
/// Variable names are matched case-insensitively against field names, so
/// `CHUNK_LENGTH` fills `chunk_length`.
///
/// # Errors
/// If a variable cannot be converted to the type of its field, or a
/// required field has no variable.
pub fn load_config<Config: DeserializeOwned>() -> Result<Config, figment::Error> {
    figment().extract()
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the level. `LOG_FORMAT=json` switches to one JSON
/// object per line, which is what log shippers expect; anything else gives
/// human readable output.
pub fn init_tracing() {
    let format = figment()
        .extract::<LoggingConfig>()
        .map(|config| config.log_format)
        .unwrap_or_default();

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            // allow log level to be overridden by RUST_LOG env var
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            // this needs to be set to remove duplicated information in the log.
            .with_current_span(false)
            .with_ansi(false)
            // remove the name of the function from every log entry
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init(),
    }
}

/// Initialize the application context with configuration from environment
/// variables.
///
/// Sets up logging first so that configuration problems are reported.
///
/// # Errors
/// If the configuration cannot be extracted from the environment variables.
pub async fn create_app_context<A, Config>() -> Result<A, figment::Error>
where
    A: ContextProvider<Config>,
    Config: DeserializeOwned,
{
    init_tracing();

    let config: Config = load_config()?;

    let context = A::new(config).await;

    Ok(context)
}
