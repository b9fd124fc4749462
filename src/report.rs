//! Turns the last response into a verdict and the text the user sees.

use std::io::{self, Write};

use crate::retry::SKEW_ERROR_PREFIX;
use crate::transport::AttemptResult;
use crate::{Verdict, VersionsItem};

pub const NOT_SYNCED: &str = "App not synced to LMS or explicitly denied in Manage Extensibility.";
pub const SKEW_UNRESOLVED: &str = "Timestamp skew could not be rectified.";
pub const UNKNOWN_ERROR: &str = "Unknown error";

const INDENT: &str = "  ";

/// Prints the outcome of `result` and returns the matching verdict.
///
/// Success goes to `out`. Failures go to `err`, except guesses, which are
/// an answer rather than a dump and go to `out`.
pub fn interpret(
    result: &AttemptResult,
    verbose: bool,
    guess: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<Verdict> {
    if result.is_ok() {
        return match serde_json::from_str::<Vec<VersionsItem>>(&result.body) {
            Ok(_) => {
                writeln!(out, "Ok")?;
                if verbose {
                    write_headers(out, &result.headers)?;
                    write_block(out, "Body:", &result.body)?;
                }
                Ok(Verdict::Success)
            }
            Err(e) => {
                writeln!(err, "Call succeeded but could not deserialize the response.")?;
                write_indented(err, &e.to_string())?;
                if !result.body.is_empty() {
                    write_indented(err, &result.body)?;
                }
                Ok(Verdict::DeserializeFailed)
            }
        };
    }

    if guess {
        writeln!(out, "{}", diagnose(result))?;
        return Ok(Verdict::Guessed);
    }

    writeln!(err, "Failure!")?;
    if let Some(message) = result.error.as_deref().filter(|m| !m.is_empty()) {
        write_block(err, "Error:", message)?;
    }
    if let Some(status) = result.status {
        write_block(err, "Status:", &status.to_string())?;
    }
    write_headers(err, &result.headers)?;
    write_block(err, "Body:", &result.body)?;
    Ok(Verdict::Reported)
}

/// Best guess at why a non-OK call failed. First matching rule wins.
pub fn diagnose(result: &AttemptResult) -> &str {
    if result.is_forbidden() && result.body == "Invalid token" {
        return NOT_SYNCED;
    }
    if result.is_forbidden() && result.body.starts_with(SKEW_ERROR_PREFIX) {
        return SKEW_UNRESOLVED;
    }
    match result.error.as_deref() {
        Some(message) if !message.is_empty() => message,
        _ => UNKNOWN_ERROR,
    }
}

fn write_headers(w: &mut dyn Write, headers: &[(String, String)]) -> io::Result<()> {
    if headers.is_empty() {
        return Ok(());
    }
    writeln!(w, "Headers:")?;
    for (name, value) in headers {
        write_indented(w, &format!("{}: {}", name, value))?;
    }
    Ok(())
}

/// Writes `label` then `text` indented, or nothing when `text` is empty.
fn write_block(w: &mut dyn Write, label: &str, text: &str) -> io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    writeln!(w, "{}", label)?;
    write_indented(w, text)
}

/// Indents every physical line of `text`.
fn write_indented(w: &mut dyn Write, text: &str) -> io::Result<()> {
    for line in text.lines() {
        writeln!(w, "{}{}", INDENT, line)?;
    }
    Ok(())
}
