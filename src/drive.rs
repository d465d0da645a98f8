//! Google Drive share links: recognition, direct-download URLs and fetching

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::thread;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::PhotoError;

pub const DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc";
const DRIVE_HOSTS: &[&str] = &["drive.google.com", "docs.google.com"];

lazy_static! {
    static ref CONFIRM_PARAM: Regex = Regex::new(r"confirm=([0-9A-Za-z_\-]+)").unwrap();
    static ref CONFIRM_INPUT: Regex =
        Regex::new(r#"name="confirm"\s+value="([0-9A-Za-z_\-]+)""#).unwrap();
}

fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Extract the file id from a Drive share link.
///
/// Recognized forms:
/// - `https://drive.google.com/file/d/<ID>/view?usp=sharing` (also `/file/u/0/d/<ID>`)
/// - `https://drive.google.com/open?id=<ID>` (also `/u/0/open`, `/uc?id=`)
pub fn extract_file_id(share_url: &str) -> Result<String, PhotoError> {
    let unrecognized = || PhotoError::UnrecognizedLinkFormat(share_url.to_string());

    let url = Url::parse(share_url.trim()).map_err(|_| unrecognized())?;
    let host = url.host_str().ok_or_else(unrecognized)?;
    if !DRIVE_HOSTS.contains(&host) {
        return Err(unrecognized());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.contains(&"folders") {
        return Err(unrecognized());
    }

    // File id in the path: /file/d/<ID>/...
    if segments.first() == Some(&"file") {
        if let Some(pos) = segments.iter().position(|seg| *seg == "d") {
            if let Some(id) = segments.get(pos + 1) {
                if is_valid_file_id(id) {
                    return Ok(id.to_string());
                }
            }
        }
        return Err(unrecognized());
    }

    // File id as a query parameter: /open?id=<ID>
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
        if is_valid_file_id(&id) {
            return Ok(id.into_owned());
        }
    }

    Err(unrecognized())
}

/// Direct-download URL for a share link, against `endpoint`
/// (normally [`DOWNLOAD_ENDPOINT`])
pub fn download_url(endpoint: &str, share_url: &str) -> Result<String, PhotoError> {
    let id = extract_file_id(share_url)?;
    Ok(format!("{}?export=download&id={}", endpoint, id))
}

/// Pull the confirm token out of Drive's "can't scan for viruses" interstitial
pub fn find_confirm_token(final_url: &str, body: &str) -> Option<String> {
    CONFIRM_PARAM
        .captures(final_url)
        .or_else(|| CONFIRM_PARAM.captures(body))
        .or_else(|| CONFIRM_INPUT.captures(body))
        .map(|c| c[1].to_string())
}

/// Raw photo bytes as served
#[derive(Debug, Clone)]
pub struct FetchedPhoto {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Anything that can turn a share link into photo bytes
pub trait PhotoSource {
    fn fetch(&self, share_url: &str) -> Result<FetchedPhoto, PhotoError>;

    /// Pause to take after each fetch
    fn politeness_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Blocking HTTP client for Drive downloads
pub struct DriveClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    attempts: u32,
    retry_backoff: Duration,
    delay: Duration,
}

fn http_client(config: &FetchConfig) -> reqwest::blocking::ClientBuilder {
    reqwest::blocking::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; SlamBookGenerator/1.0)")
        .timeout(config.timeout())
}

impl DriveClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = http_client(config).build()?;
        Ok(Self::with_client(client, config, DOWNLOAD_ENDPOINT))
    }

    fn with_client(client: reqwest::blocking::Client, config: &FetchConfig, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            attempts: config.attempts.max(1),
            retry_backoff: config.retry_backoff(),
            delay: config.delay(),
        }
    }

    /// GET with bounded retries on transport errors and 5xx responses
    fn get_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response, PhotoError> {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.client.get(url).send() {
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("HTTP {}", response.status());
                }
                Ok(response) => return Ok(response),
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.attempts {
                eprintln!(
                    "   Attempt {}/{} failed ({}), retrying...",
                    attempt, self.attempts, last_error
                );
                thread::sleep(self.retry_backoff * attempt);
            }
        }

        Err(PhotoError::FetchFailure {
            url: url.to_string(),
            reason: last_error,
        })
    }
}

/// Media type without parameters: "image/jpeg; charset=binary" -> "image/jpeg"
fn content_type_of(response: &reqwest::blocking::Response) -> String {
    let raw = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    media_type(raw)
}

fn media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_lowercase()
}

/// Drive serves some photos as octet-stream; those still go through the decoder
fn is_image_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/") || content_type.starts_with("application/octet-stream")
}

impl PhotoSource for DriveClient {
    fn fetch(&self, share_url: &str) -> Result<FetchedPhoto, PhotoError> {
        let url = download_url(&self.endpoint, share_url)?;
        let fetch_failure = |reason: String| PhotoError::FetchFailure {
            url: url.clone(),
            reason,
        };

        let mut response = self.get_with_retry(&url)?;
        let mut content_type = content_type_of(&response);

        // Large files land on a confirmation page first
        if response.status().is_success() && content_type.starts_with("text/html") {
            let final_url = response.url().to_string();
            let body = response
                .text()
                .map_err(|e| fetch_failure(e.to_string()))?;
            let token = find_confirm_token(&final_url, &body).ok_or_else(|| {
                fetch_failure("Drive returned an HTML page instead of the file".to_string())
            })?;
            let confirmed = format!("{}&confirm={}", url, token);
            response = self.get_with_retry(&confirmed)?;
            content_type = content_type_of(&response);
        }

        if !response.status().is_success() {
            return Err(fetch_failure(format!("HTTP {}", response.status())));
        }
        if !is_image_content_type(&content_type) {
            return Err(fetch_failure(format!(
                "not an image (content-type: {})",
                if content_type.is_empty() { "none" } else { content_type.as_str() }
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| fetch_failure(e.to_string()))?;

        Ok(FetchedPhoto {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    fn politeness_delay(&self) -> Duration {
        self.delay
    }
}
