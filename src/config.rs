use std::ffi::OsString;

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Parser};
use reqwest::Url;

/// Command line as typed. `-h` is taken by `--host`, so help is long-only.
#[derive(Parser, Debug)]
#[command(
    name = "authcheck",
    about = "Checks that an app id/key pair can authenticate against a Valence host.",
    disable_help_flag = true
)]
pub struct Cli {
    /// Application id issued for the app
    #[arg(long = "appId", value_parser = NonEmptyStringValueParser::new())]
    pub app_id: String,

    /// Application key paired with the id
    #[arg(long = "appKey", value_parser = NonEmptyStringValueParser::new())]
    pub app_key: String,

    /// LMS host, e.g. https://lms.example.com (any path is ignored)
    #[arg(short = 'h', long = "host")]
    pub host: Url,

    /// Print progress, response headers and body
    #[arg(short, long)]
    pub verbose: bool,

    /// Guess at the cause of a failure instead of dumping the response
    #[arg(short, long)]
    pub guess: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub app_id: String,
    pub app_key: String,
    /// Scheme, host and port only.
    pub host: Url,
    pub verbose: bool,
    pub guess: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("host URL has no scheme, host and port to connect to: {0}")]
    NoOrigin(Url),
}

/// Why no [`Config`] came out of the command line.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    /// clap declined: help was asked for, or the flags are wrong.
    #[error("{0}")]
    Declined(#[from] clap::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if !cli.host.origin().is_tuple() {
            return Err(ConfigError::NoOrigin(cli.host));
        }
        let mut host = cli.host;
        host.set_path("/");
        host.set_query(None);
        host.set_fragment(None);
        // Tuple origins always accept credentials, so these cannot fail.
        let _ = host.set_username("");
        let _ = host.set_password(None);

        Ok(Self {
            app_id: cli.app_id,
            app_key: cli.app_key,
            host,
            verbose: cli.verbose,
            guess: cli.guess,
        })
    }
}

/// Parses `args` (program name first) into a [`Config`].
pub fn parse_args<I, T>(args: I) -> Result<Config, ArgsError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    Ok(Config::from_cli(cli)?)
}
