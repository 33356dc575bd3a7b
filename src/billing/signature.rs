//! Standard Webhooks signature verification
//!
//! Signed content is `{webhook-id}.{webhook-timestamp}.{body}` under
//! HMAC-SHA256; the `webhook-signature` header lists space-separated
//! `v1,<base64>` entries, any of which may match.

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::common::auth::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "webhook-id";
pub const HEADER_TIMESTAMP: &str = "webhook-timestamp";
pub const HEADER_SIGNATURE: &str = "webhook-signature";

const SECRET_PREFIX: &str = "whsec_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    MissingHeader(&'static str),
    InvalidTimestamp,
    TimestampOutOfTolerance,
    NoMatchingSignature,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingHeader(name) => write!(f, "Missing required header: {}", name),
            SignatureError::InvalidTimestamp => write!(f, "Invalid webhook timestamp"),
            SignatureError::TimestampOutOfTolerance => {
                write!(f, "Message timestamp outside of tolerance window")
            }
            SignatureError::NoMatchingSignature => write!(f, "No matching signature found"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Headers of a verified delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDelivery {
    pub id: String,
    pub timestamp: i64,
}

/// Verifies webhook deliveries against one signing secret
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance_secs: i64) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(&secret_bytes(secret))
            .map_err(|e| anyhow::anyhow!("Invalid webhook secret: {}", e))?;
        Ok(Self {
            mac,
            tolerance_secs: tolerance_secs.max(1),
        })
    }

    pub fn tolerance_secs(&self) -> i64 {
        self.tolerance_secs
    }

    /// Verify a delivery received at unix time `now`
    pub fn verify(
        &self,
        headers: &HeaderMap,
        body: &str,
        now: i64,
    ) -> Result<VerifiedDelivery, SignatureError> {
        let id = header(headers, HEADER_ID)?;
        let timestamp_raw = header(headers, HEADER_TIMESTAMP)?;
        let signature = header(headers, HEADER_SIGNATURE)?;

        if !timestamp_raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(SignatureError::InvalidTimestamp);
        }
        let timestamp: i64 = timestamp_raw
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let expected = self.sign(id, timestamp_raw, body);
        let matched = candidate_signatures(signature)
            .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));
        if !matched {
            return Err(SignatureError::NoMatchingSignature);
        }

        Ok(VerifiedDelivery {
            id: id.to_string(),
            timestamp,
        })
    }

    /// Base64 HMAC over `{id}.{timestamp}.{body}`
    pub fn sign(&self, id: &str, timestamp: &str, body: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

/// Signing key: `whsec_` secrets are base64, anything else is used as-is
fn secret_bytes(secret: &str) -> Vec<u8> {
    if let Some(encoded) = secret.strip_prefix(SECRET_PREFIX) {
        match STANDARD.decode(encoded) {
            Ok(decoded) if !decoded.is_empty() => return decoded,
            _ => return encoded.as_bytes().to_vec(),
        }
    }
    secret.as_bytes().to_vec()
}

/// `v1` signatures from the header, other versions are skipped
fn candidate_signatures(header: &str) -> impl Iterator<Item = &str> {
    header.split_whitespace().filter_map(|entry| {
        let (version, value) = entry.split_once(',')?;
        (version == "v1" && !value.is_empty()).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;
    const BODY: &str = r#"{"type":"subscription.created","data":{"id":"sub_1"}}"#;

    fn signed_headers(verifier: &WebhookVerifier, id: &str, ts: i64, body: &str) -> HeaderMap {
        let signature = verifier.sign(id, &ts.to_string(), body);
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, id.parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, ts.to_string().parse().unwrap());
        headers.insert(
            HEADER_SIGNATURE,
            format!("v1,{}", signature).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_accepts_correct_signature() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let headers = signed_headers(&verifier, "msg_1", NOW, BODY);

        let delivery = verifier.verify(&headers, BODY, NOW + 10).unwrap();

        assert_eq!(delivery.id, "msg_1");
        assert_eq!(delivery.timestamp, NOW);
    }

    #[test]
    fn test_rejects_tampered_body() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let headers = signed_headers(&verifier, "msg_1", NOW, BODY);

        let err = verifier
            .verify(&headers, &BODY.replace("sub_1", "sub_2"), NOW)
            .unwrap_err();

        assert_eq!(err, SignatureError::NoMatchingSignature);
    }

    #[test]
    fn test_rejects_other_secret() {
        let signer = WebhookVerifier::new("other-secret", 300).unwrap();
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let headers = signed_headers(&signer, "msg_1", NOW, BODY);

        assert_eq!(
            verifier.verify(&headers, BODY, NOW).unwrap_err(),
            SignatureError::NoMatchingSignature
        );
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let headers = signed_headers(&verifier, "msg_1", NOW - 301, BODY);

        assert_eq!(
            verifier.verify(&headers, BODY, NOW).unwrap_err(),
            SignatureError::TimestampOutOfTolerance
        );
    }

    #[test]
    fn test_rejects_missing_headers() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let mut headers = signed_headers(&verifier, "msg_1", NOW, BODY);
        headers.remove(HEADER_SIGNATURE);

        let err = verifier.verify(&headers, BODY, NOW).unwrap_err();

        assert_eq!(err, SignatureError::MissingHeader(HEADER_SIGNATURE));
        assert_eq!(err.to_string(), "Missing required header: webhook-signature");
    }

    #[test]
    fn test_rejects_non_numeric_timestamp() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let mut headers = signed_headers(&verifier, "msg_1", NOW, BODY);
        headers.insert(HEADER_TIMESTAMP, "-5".parse().unwrap());

        assert_eq!(
            verifier.verify(&headers, BODY, NOW).unwrap_err(),
            SignatureError::InvalidTimestamp
        );
    }

    #[test]
    fn test_whsec_secret_is_base64_decoded() {
        // "secret-key" in base64
        let verifier = WebhookVerifier::new("whsec_c2VjcmV0LWtleQ==", 300).unwrap();
        let raw = WebhookVerifier::new("secret-key", 300).unwrap();

        assert_eq!(
            verifier.sign("msg_1", "1", BODY),
            raw.sign("msg_1", "1", BODY)
        );
    }

    #[test]
    fn test_any_listed_v1_signature_may_match() {
        let verifier = WebhookVerifier::new("polar-secret", 300).unwrap();
        let good = verifier.sign("msg_1", &NOW.to_string(), BODY);
        let mut headers = signed_headers(&verifier, "msg_1", NOW, BODY);
        headers.insert(
            HEADER_SIGNATURE,
            format!("v1,bm90LWl0 v2,{} v1,{}", good, good).parse().unwrap(),
        );

        assert!(verifier.verify(&headers, BODY, NOW).is_ok());
    }

    #[test]
    fn test_candidate_signatures_skip_other_versions() {
        let found: Vec<&str> = candidate_signatures("v1,abc v2,def v1, junk v1,ghi").collect();
        assert_eq!(found, vec!["abc", "ghi"]);
    }
}
