//! authcheck: can this app id/key pair authenticate against a Valence host?
//!
//! Signs one anonymous GET of `/d2l/api/versions/`, retries a couple of
//! times if the server complains about clock skew, and explains the result.
//! - [`config`] turns the command line into a [`Config`]
//! - [`retry`] makes the signed calls
//! - [`report`] prints the verdict

pub mod clock;
pub mod config;
pub mod report;
pub mod retry;
pub mod signer;
pub mod transport;

use std::io::{self, Write};

use serde::Deserialize;

pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{Config, parse_args};
pub use crate::transport::{HttpTransport, Transport};

/// Exit code when clap declined the command line (help, bad flags).
pub const EXIT_ARGS_DECLINED: i32 = -1;
/// Exit code for anything unexpected before or outside the call.
pub const EXIT_INTERNAL: i32 = -2;

/// One entry of the `/d2l/api/versions/` response.
#[derive(Debug, Deserialize)]
pub struct VersionsItem {
    #[serde(rename = "ProductCode")]
    pub product_code: String,
    #[serde(rename = "LatestVersion")]
    pub latest_version: String,
    #[serde(rename = "SupportedVersions")]
    pub supported_versions: Vec<String>,
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 200 with a well-formed versions list.
    Success,
    /// 200 but the body is not a versions list.
    DeserializeFailed,
    /// Non-200, cause guessed.
    Guessed,
    /// Non-200, response dumped.
    Reported,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::DeserializeFailed => -3,
            Verdict::Guessed | Verdict::Reported => -4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    pub attempts: u32,
}

/// Runs the whole check for `config`, writing what the user sees to `out`
/// and `err`.
///
/// # Example
/// ```no_run
/// # use authcheck::{check, parse_args, HttpTransport, SystemClock};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = parse_args(["authcheck", "--appId", "id", "--appKey", "key", "-h", "https://lms.example.com"])?;
/// let outcome = check(&config, &HttpTransport, &SystemClock, &mut std::io::stdout(), &mut std::io::stderr())?;
/// std::process::exit(outcome.verdict.exit_code());
/// # }
/// ```
pub fn check<T, C>(
    config: &Config,
    transport: &T,
    clock: &C,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<CheckOutcome>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let mut ctx = signer::CallerContext::anonymous(&config.app_id, &config.app_key);
    let retried = retry::call_with_skew_retry(
        &mut ctx,
        &config.host,
        transport,
        clock,
        config.verbose,
        out,
    )?;
    let verdict = report::interpret(&retried.result, config.verbose, config.guess, out, err)?;
    Ok(CheckOutcome {
        verdict,
        attempts: retried.attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use reqwest::{StatusCode, Url};

    use super::*;
    use crate::clock::FixedClock;
    use crate::signer::ApiRequest;
    use crate::transport::AttemptResult;

    struct Canned(RefCell<VecDeque<AttemptResult>>);

    impl Canned {
        fn new(replies: Vec<AttemptResult>) -> Self {
            Self(RefCell::new(replies.into()))
        }
    }

    impl Transport for Canned {
        fn execute(&self, _host: &Url, _request: &ApiRequest) -> AttemptResult {
            self.0
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| AttemptResult::transport_error("no reply queued"))
        }
    }

    fn config(verbose: bool, guess: bool) -> Config {
        Config {
            app_id: "id".to_string(),
            app_key: "key".to_string(),
            host: Url::parse("https://lms.example.com").unwrap(),
            verbose,
            guess,
        }
    }

    fn skew() -> AttemptResult {
        AttemptResult::response(
            StatusCode::FORBIDDEN,
            "Timestamp out of range: server time 1700000000",
        )
    }

    fn run(config: &Config, replies: Vec<AttemptResult>) -> (CheckOutcome, String, String) {
        let transport = Canned::new(replies);
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        let outcome = check(config, &transport, &FixedClock(0), &mut out, &mut err).unwrap();
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_skew_then_success() {
        let ok = AttemptResult::response(
            StatusCode::OK,
            r#"[{"ProductCode":"le","LatestVersion":"1.80","SupportedVersions":["1.79","1.80"]}]"#,
        );
        let (outcome, out, err) = run(&config(false, false), vec![skew(), ok]);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.verdict.exit_code(), 0);
        assert_eq!(out, "Ok\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_unresolved_skew_verbose_reported() {
        let (outcome, out, err) = run(&config(true, false), vec![skew(), skew(), skew()]);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.verdict, Verdict::Reported);
        assert_eq!(outcome.verdict.exit_code(), -4);
        assert!(out.contains("Too much timestamp skew, giving up."));
        assert!(err.starts_with("Failure!\n"));
    }

    #[test]
    fn test_unresolved_skew_guessed() {
        let (outcome, out, _) = run(&config(false, true), vec![skew(), skew(), skew()]);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.verdict, Verdict::Guessed);
        assert_eq!(out, "Timestamp skew could not be rectified.\n");
    }

    #[test]
    fn test_success_ignores_flags() {
        for (verbose, guess) in [(false, false), (true, true)] {
            let ok = AttemptResult::response(StatusCode::OK, "[]");
            let (outcome, _, err) = run(&config(verbose, guess), vec![ok]);
            assert_eq!(outcome.attempts, 1);
            assert_eq!(outcome.verdict, Verdict::Success);
            assert!(err.is_empty());
        }
    }
}
