//! AWS Signature Version 4 for single S3 GET requests.
//!
//! Only what an unsigned-payload GET without a query string needs: canonical
//! request, string to sign, derived signing key, `Authorization` header value.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub const ACCESS_KEY_VAR: &'static str = "AWS_ACCESS_KEY_ID";
    pub const SECRET_KEY_VAR: &'static str = "AWS_SECRET_ACCESS_KEY";
    pub const SESSION_TOKEN_VAR: &'static str = "AWS_SESSION_TOKEN";

    /// Read credentials through `lookup`. Returns the name of the first
    /// required variable that is missing or empty.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, &'static str> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Ok(Self {
            access_key_id: non_empty(Self::ACCESS_KEY_VAR).ok_or(Self::ACCESS_KEY_VAR)?,
            secret_access_key: non_empty(Self::SECRET_KEY_VAR).ok_or(Self::SECRET_KEY_VAR)?,
            session_token: non_empty(Self::SESSION_TOKEN_VAR),
        })
    }

    pub fn from_env() -> Result<Self, &'static str> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Who signs, where, and when.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

impl SigningParams<'_> {
    fn date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    fn scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.date(), self.region, self.service)
    }
}

/// `x-amz-date` header value.
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Percent-encode per the SigV4 rules: unreserved characters pass through,
/// everything else becomes `%XX` (uppercase) over its UTF-8 bytes.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(params: &SigningParams<'_>) -> Vec<u8> {
    let secret = format!("AWS4{}", params.credentials.secret_access_key);
    let k_date = hmac(secret.as_bytes(), params.date().as_bytes());
    let k_region = hmac(&k_date, params.region.as_bytes());
    let k_service = hmac(&k_region, params.service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Build the canonical request for a query-less request.
///
/// `headers` must include every header that will be signed, `host` among them.
fn canonical_request(
    method: &str,
    canonical_uri: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> (String, String) {
    let mut headers: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let request = format!(
        "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    (request, signed_headers)
}

/// Compute the `Authorization` header value for a request.
pub fn authorization(
    method: &str,
    canonical_uri: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
    params: &SigningParams<'_>,
) -> String {
    let (request, signed_headers) = canonical_request(method, canonical_uri, headers, payload_hash);
    let scope = params.scope();
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{:x}",
        amz_date(params.time),
        Sha256::digest(request.as_bytes())
    );

    let signature: String = hmac(&signing_key(params), string_to_sign.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id
    )
}
