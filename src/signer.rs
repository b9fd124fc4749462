//! ID-key request signing for the Valence API.
//!
//! An anonymous caller only proves the application identity: every request
//! carries `x_a` (app id), `x_t` (issue time in seconds) and `x_c`, the
//! HMAC-SHA256 of `METHOD&path&x_t` keyed by the app key, base64url encoded
//! without padding.

use base64::{Engine as _, engine::general_purpose};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const APP_ID_PARAM: &str = "x_a";
pub const APP_SIG_PARAM: &str = "x_c";
pub const TIMESTAMP_PARAM: &str = "x_t";

/// Anonymous identity used for the whole run.
///
/// `skew_ms` is the server-minus-client clock difference applied to every
/// timestamp this context signs. Only the skew-retry loop changes it.
#[derive(Debug, Clone)]
pub struct CallerContext {
    app_id: String,
    app_key: String,
    pub skew_ms: i64,
}

impl CallerContext {
    pub fn anonymous(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
            skew_ms: 0,
        }
    }

    /// Builds a signer stamped at `now_ms` shifted by the current skew.
    /// The sum saturates, so an absurd server time cannot wrap `x_t`.
    pub fn signer(&self, now_ms: i64) -> IdKeySigner<'_> {
        IdKeySigner {
            context: self,
            issued_at: now_ms.saturating_add(self.skew_ms).div_euclid(1000),
        }
    }
}

/// A request about to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.to_string(),
            query: Vec::new(),
        }
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub trait RequestSigner {
    fn sign(&self, request: &mut ApiRequest) -> Result<(), InvalidLength>;
}

#[derive(Debug)]
pub struct IdKeySigner<'a> {
    context: &'a CallerContext,
    issued_at: i64,
}

impl IdKeySigner<'_> {
    /// Issue time in seconds since the epoch, skew included.
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

impl RequestSigner for IdKeySigner<'_> {
    fn sign(&self, request: &mut ApiRequest) -> Result<(), InvalidLength> {
        let timestamp = self.issued_at.to_string();
        let signature = signature_for(
            &self.context.app_key,
            &request.method,
            &request.path,
            &timestamp,
        )?;
        request
            .query
            .push((APP_ID_PARAM.to_string(), self.context.app_id.clone()));
        request.query.push((APP_SIG_PARAM.to_string(), signature));
        request.query.push((TIMESTAMP_PARAM.to_string(), timestamp));
        Ok(())
    }
}

/// Computes the `x_c` value for one request.
pub fn signature_for(
    key: &str,
    method: &str,
    path: &str,
    timestamp: &str,
) -> Result<String, InvalidLength> {
    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        path.to_lowercase(),
        timestamp
    );
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())?;
    mac.update(base.as_bytes());
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_adds_identity_and_timestamp() {
        let ctx = CallerContext::anonymous("app-1", "secret");
        let mut req = ApiRequest::get("/d2l/api/versions/");
        ctx.signer(1_700_000_000_999).sign(&mut req).unwrap();

        assert_eq!(req.query_param(APP_ID_PARAM), Some("app-1"));
        assert_eq!(req.query_param(TIMESTAMP_PARAM), Some("1700000000"));

        let sig = req.query_param(APP_SIG_PARAM).unwrap();
        assert_eq!(sig.len(), 43);
        assert!(!sig.contains('=') && !sig.contains('+') && !sig.contains('/'));
    }

    #[test]
    fn test_skew_shifts_timestamp() {
        let mut ctx = CallerContext::anonymous("app", "key");
        ctx.skew_ms = 3_600_000;
        assert_eq!(ctx.signer(1_000_000).issued_at(), 4_600);

        ctx.skew_ms = -1_500;
        assert_eq!(ctx.signer(1_000).issued_at(), -1);
    }

    #[test]
    fn test_huge_skew_saturates() {
        let mut ctx = CallerContext::anonymous("app", "key");
        ctx.skew_ms = i64::MAX - 10;
        assert_eq!(ctx.signer(5_000).issued_at(), i64::MAX / 1000);
    }

    #[test]
    fn test_signature_depends_on_inputs() {
        let a = signature_for("key", "GET", "/d2l/api/versions/", "100").unwrap();
        assert_eq!(a, signature_for("key", "get", "/D2L/API/VERSIONS/", "100").unwrap());
        assert_ne!(a, signature_for("key", "GET", "/d2l/api/versions/", "101").unwrap());
        assert_ne!(a, signature_for("other", "GET", "/d2l/api/versions/", "100").unwrap());
    }
}
