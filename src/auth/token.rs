//! Bearer token claim decoding
//!
//! Only the payload segment is read; the signature is the backend's business.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a token could not be decoded
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("payload is not a JSON claims object: {0}")]
    Claims(#[from] serde_json::Error),
}

/// The claims the client cares about
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<f64>,

    /// Subject
    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenClaims {
    /// Whether the token is still usable at `now`. A token without an expiry
    /// claim is never considered valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        match self.exp {
            Some(exp) => exp >= now_secs,
            None => false,
        }
    }
}

/// Decode the claims segment of a three-part token
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenError::Segments(segments.len()));
    };

    let bytes = PAYLOAD_ENGINE.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}
