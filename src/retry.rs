//! Signed calls to the versions route, corrected for clock skew.
//!
//! The LMS rejects a signature whose timestamp is too far from its own
//! clock with `403 Timestamp out of range` and puts its current time (in
//! seconds) somewhere in the body. We read that value, shift our signing
//! clock to match, and try again, at most [`MAX_ATTEMPTS`] times in total.

use std::io::{self, Write};

use reqwest::Url;
use tracing::debug;

use crate::clock::Clock;
use crate::signer::{ApiRequest, CallerContext, RequestSigner};
use crate::transport::{AttemptResult, Transport};

pub const MAX_ATTEMPTS: u32 = 3;
pub const VERSIONS_PATH: &str = "/d2l/api/versions/";
pub const SKEW_ERROR_PREFIX: &str = "Timestamp out of range";

/// The last response seen and how many calls it took to get it.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: AttemptResult,
    pub attempts: u32,
}

/// True for a 403 whose body starts with the skew marker.
pub fn is_skew_error(result: &AttemptResult) -> bool {
    result.is_forbidden() && result.body.starts_with(SKEW_ERROR_PREFIX)
}

/// Pulls the first run of decimal digits out of `text`.
pub fn first_number(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &text[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Offset to add to local time so it matches the server, given a skew
/// error body. `None` if the body holds no usable server time.
pub fn skew_from_body(body: &str, now_ms: i64) -> Option<i64> {
    let server_ms = first_number(body)?.checked_mul(1000)?;
    server_ms.checked_sub(now_ms)
}

/// Runs up to [`MAX_ATTEMPTS`] signed GETs of [`VERSIONS_PATH`] on `host`.
///
/// `ctx.skew_ms` is only touched between attempts, after a skew error.
/// Progress lines go to `out` when `verbose` is set.
pub fn call_with_skew_retry<T, C>(
    ctx: &mut CallerContext,
    host: &Url,
    transport: &T,
    clock: &C,
    verbose: bool,
    out: &mut dyn Write,
) -> io::Result<RetryOutcome>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        if verbose && attempts > 1 {
            writeln!(out, "Attempt #{}", attempts)?;
        }

        let mut request = ApiRequest::get(VERSIONS_PATH);
        let signer = ctx.signer(clock.now_ms());
        if let Err(e) = signer.sign(&mut request) {
            let result = AttemptResult::transport_error(format!("Could not sign request: {}", e));
            return Ok(RetryOutcome { result, attempts });
        }
        debug!(attempt = attempts, x_t = signer.issued_at(), "calling versions route");

        let result = transport.execute(host, &request);

        let mut again = false;
        if is_skew_error(&result) {
            match skew_from_body(&result.body, clock.now_ms()) {
                Some(skew) => {
                    debug!(previous = ctx.skew_ms, skew, "server reported timestamp skew");
                    ctx.skew_ms = skew;
                    again = true;
                }
                None => debug!("skew error carried no usable server time"),
            }
        }

        if !again {
            return Ok(RetryOutcome { result, attempts });
        }
        if attempts >= MAX_ATTEMPTS {
            if verbose {
                writeln!(out, "Too much timestamp skew, giving up.")?;
            }
            return Ok(RetryOutcome { result, attempts });
        }
    }
}
