//! Image-link checker for generated documents
//!
//! Generated pages often reference stock photos by URL. Each URL is probed
//! with a HEAD request under a short timeout; the outcome is advisory and
//! never fails the surrounding request.

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::debug;

/// Per-request budget for a HEAD probe
pub const IMAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://images\.unsplash\.com/photo-[^\s"'`()<>]+"#).expect("valid image url regex")
});

/// Image URLs in order of first appearance, without duplicates
pub fn extract_image_urls(code: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in IMAGE_URL.find_iter(code) {
        let url = m.as_str().trim_end_matches(['.', ',', ';']);
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Result of checking a document's image links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub total: usize,
    pub valid: usize,
    pub broken: Vec<String>,
}

impl ImageReport {
    /// `valid/total`, e.g. "3/4"
    pub fn summary(&self) -> String {
        format!("{}/{}", self.valid, self.total)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Probes image URLs concurrently
#[derive(Clone)]
pub struct ImageChecker {
    http: Client,
    timeout: Duration,
}

impl Default for ImageChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageChecker {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            timeout: IMAGE_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a URL answers 2xx with an `image/*` content type in time
    pub async fn probe(&self, url: &str) -> bool {
        let request = self.http.head(url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                let is_image = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.starts_with("image/"))
                    .unwrap_or(false);
                response.status().is_success() && is_image
            }
            Ok(Err(e)) => {
                debug!("Image probe failed for {}: {}", url, e);
                false
            }
            Err(_) => {
                debug!("Image probe timed out for {}", url);
                false
            }
        }
    }

    /// Check every image URL in `code`
    pub async fn check(&self, code: &str) -> ImageReport {
        let urls = extract_image_urls(code);
        if urls.is_empty() {
            return ImageReport::default();
        }

        let results = join_all(urls.iter().map(|url| self.probe(url))).await;
        let broken: Vec<String> = urls
            .iter()
            .zip(&results)
            .filter(|(_, ok)| !**ok)
            .map(|(url, _)| url.clone())
            .collect();

        let report = ImageReport {
            total: urls.len(),
            valid: urls.len() - broken.len(),
            broken,
        };
        debug!("Image links valid: {}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_image_urls() {
        let code = r#"<img src="https://images.unsplash.com/photo-1-abc?w=800&q=80">
            <div style="background: url(https://images.unsplash.com/photo-2-def)"></div>
            <img src='https://images.unsplash.com/photo-1-abc?w=800&q=80'>
            <img src="https://example.com/photo-3.png">"#;
        assert_eq!(
            extract_image_urls(code),
            vec![
                "https://images.unsplash.com/photo-1-abc?w=800&q=80",
                "https://images.unsplash.com/photo-2-def"
            ]
        );
    }

    #[tokio::test]
    async fn test_no_images_no_requests() {
        let report = ImageChecker::new().check("<p>text only</p>").await;
        assert!(report.is_empty());
        assert_eq!(report.summary(), "0/0");
    }
}
