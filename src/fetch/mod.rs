//! Source byte retrieval.
//!
//! Three read methods, all addressing the object with a path-style URL
//! (`{scheme}://{endpoint}/{bucket}/{key}`):
//!
//! | Read method | Source | Transport |
//! |---|---|---|
//! | `authenticated` | [`S3Source`] | HTTPS, SigV4-signed with credentials from the environment |
//! | `https` | [`HttpSource`] | HTTPS, anonymous |
//! | `http` | [`HttpSource`] | HTTP, anonymous |
//!
//! Every source reads the whole object into memory; decoding needs random
//! access anyway. Requests are made once: no retries, no backoff.

pub mod sigv4;

use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder};
use sigv4::{Credentials, SigningParams, UNSIGNED_PAYLOAD};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),
    #[error("cannot address {location}: {reason}")]
    InvalidUrl { location: String, reason: String },
}

/// Bucket + key of the object to transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Percent-encoded path-style URI: `/{bucket}/{key}`.
    pub fn path(&self) -> String {
        format!(
            "/{}/{}",
            sigv4::uri_encode(&self.bucket, true),
            sigv4::uri_encode(&self.key, false)
        )
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMethod {
    #[default]
    Authenticated,
    Https,
    Http,
}

impl ReadMethod {
    pub fn name(self) -> &'static str {
        match self {
            ReadMethod::Authenticated => "authenticated",
            ReadMethod::Https => "https",
            ReadMethod::Http => "http",
        }
    }
}

impl FromStr for ReadMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authenticated" => Ok(ReadMethod::Authenticated),
            "https" => Ok(ReadMethod::Https),
            "http" => Ok(ReadMethod::Http),
            other => Err(format!(
                "read method '{other}' not supported (expected authenticated, https, or http)"
            )),
        }
    }
}

impl fmt::Display for ReadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where requests go and how long they may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Host (optionally `host:port`) serving path-style bucket URLs.
    pub endpoint: String,
    /// Region used in the SigV4 credential scope.
    pub region: String,
    pub timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            endpoint: "s3-us-west-2.amazonaws.com".to_string(),
            region: "us-west-2".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Anything that can produce the raw bytes of an object.
pub trait ImageSource {
    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError>;
}

fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("resizer/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Parse `{scheme}://{endpoint}/{bucket}/{key}`.
///
/// The URL parser resolves `.` and `..` segments; a path that comes back
/// different from [`ObjectLocation::path`] would fetch (and sign) some other
/// object, so it is refused.
fn object_url(scheme: &str, endpoint: &str, location: &ObjectLocation) -> Result<Url, FetchError> {
    let path = location.path();
    let invalid = |reason: String| FetchError::InvalidUrl {
        location: location.to_string(),
        reason,
    };
    let url = Url::parse(&format!("{scheme}://{endpoint}{path}"))
        .map_err(|e| invalid(format!("{endpoint}: {e}")))?;
    if url.path() != path {
        return Err(invalid(format!(
            "path {path} would be requested as {}",
            url.path()
        )));
    }
    Ok(url)
}

/// Send a GET and read the full body, treating non-2xx as an error.
fn read_body(request: RequestBuilder, url: String) -> Result<Vec<u8>, FetchError> {
    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status { status, url });
    }
    let bytes = response.bytes()?;
    debug!(len = bytes.len(), %url, "Fetched object");
    Ok(bytes.to_vec())
}

/// Anonymous GET over plain HTTP or HTTPS.
pub struct HttpSource {
    client: Client,
    secure: bool,
    endpoint: String,
}

impl HttpSource {
    pub fn new(secure: bool, settings: &SourceSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            secure,
            endpoint: settings.endpoint.clone(),
        })
    }

    pub fn url(&self, location: &ObjectLocation) -> Result<Url, FetchError> {
        let scheme = if self.secure { "https" } else { "http" };
        object_url(scheme, &self.endpoint, location)
    }
}

impl ImageSource for HttpSource {
    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
        if self.secure {
            info!("Reading image from S3 with https");
        } else {
            info!("Reading image from S3 with http");
        }
        let url = self.url(location)?;
        read_body(self.client.get(url.clone()), url.to_string())
    }
}

/// SigV4-signed GET over HTTPS.
pub struct S3Source {
    client: Client,
    settings: SourceSettings,
    credentials: Credentials,
}

impl S3Source {
    pub fn new(settings: &SourceSettings, credentials: Credentials) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            settings: settings.clone(),
            credentials,
        })
    }

    /// Read static credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    /// and (optionally) `AWS_SESSION_TOKEN`.
    pub fn from_env(settings: &SourceSettings) -> Result<Self, FetchError> {
        let credentials = Credentials::from_env().map_err(FetchError::MissingCredentials)?;
        Self::new(settings, credentials)
    }

    pub fn url(&self, location: &ObjectLocation) -> Result<Url, FetchError> {
        object_url("https", &self.settings.endpoint, location)
    }

    /// Headers to attach to the GET, `Authorization` last.
    ///
    /// `Host` is signed but not returned: the HTTP client derives it from the URL.
    pub fn signed_headers(
        &self,
        location: &ObjectLocation,
        time: chrono::DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        let date = sigv4::amz_date(time);
        let mut headers: Vec<(&'static str, String)> = vec![
            ("x-amz-content-sha256", UNSIGNED_PAYLOAD.to_string()),
            ("x-amz-date", date),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }

        let mut to_sign: Vec<(&str, &str)> = vec![("host", self.settings.endpoint.as_str())];
        to_sign.extend(headers.iter().map(|(name, value)| (*name, value.as_str())));

        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.settings.region,
            service: "s3",
            time,
        };
        let authorization = sigv4::authorization(
            "GET",
            &location.path(),
            &to_sign,
            UNSIGNED_PAYLOAD,
            &params,
        );
        headers.push(("authorization", authorization));
        headers
    }
}

impl ImageSource for S3Source {
    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
        info!("Reading image from S3");
        let url = self.url(location)?;
        let request = self
            .signed_headers(location, Utc::now())
            .into_iter()
            .fold(self.client.get(url.clone()), |req, (name, value)| {
                req.header(name, value)
            });
        read_body(request, url.to_string())
    }
}

/// Build the source for a read method.
pub fn source_for(
    method: ReadMethod,
    settings: &SourceSettings,
) -> Result<Box<dyn ImageSource>, FetchError> {
    debug!(%method, endpoint = %settings.endpoint, "Selecting image source");
    Ok(match method {
        ReadMethod::Authenticated => Box::new(S3Source::from_env(settings)?),
        ReadMethod::Https => Box::new(HttpSource::new(true, settings)?),
        ReadMethod::Http => Box::new(HttpSource::new(false, settings)?),
    })
}
