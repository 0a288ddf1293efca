//! Unsigned JWT payload decode, sufficient only for reading the expiry
//! claim. The client cannot verify signatures meaningfully, so no
//! verification library is involved.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Reads the `exp` claim (seconds since epoch) from a JWT without
/// verifying it. Returns `None` when the token is not a decodable JWT or
/// carries no expiry.
pub(crate) fn expiry_second(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp
}

/// Whether the token's expiry lies strictly after `cutoff_second`.
/// An undecodable token or one without `exp` counts as expired.
pub(crate) fn expires_after(token: &str, cutoff_second: i64) -> bool {
    expiry_second(token).is_some_and(|exp| exp > cutoff_second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
        format!("{header}.{payload}.")
    }

    #[test]
    fn reads_exp_claim() {
        assert_eq!(expiry_second(&unsigned_jwt(1_700_000_000)), Some(1_700_000_000));
    }

    #[test]
    fn compares_against_cutoff() {
        let token = unsigned_jwt(1_000);
        assert!(expires_after(&token, 999));
        assert!(!expires_after(&token, 1_000));
        assert!(!expires_after(&token, 2_000));
    }

    #[test]
    fn opaque_token_counts_as_expired() {
        assert_eq!(expiry_second("not-a-jwt"), None);
        assert!(!expires_after("not-a-jwt", 0));
    }

    #[test]
    fn payload_without_exp_counts_as_expired() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"user"}"#);
        let token = format!("{header}.{payload}.");
        assert!(!expires_after(&token, 0));
    }
}
