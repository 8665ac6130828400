//! Video identity resolution.
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::http::Transport;

static EMBED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id: "(.+?)""#).expect("valid embed id pattern"));

/// A video on the platform, plus the page it is embedded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoIdentity {
    video_id: String,
    referer: Option<String>,
}

impl VideoIdentity {
    /// Identity for an already known video id.
    pub fn new(video_id: impl Into<String>, referer: Option<String>) -> Self {
        Self {
            video_id: video_id.into(),
            referer,
        }
    }

    /// Resolve the video id behind an embed URL.
    ///
    /// The embed page is requested with `referer` as `Referer` (private videos
    /// are only served to the sites they are embedded in), and the id is read
    /// from the player bootstrap script.
    pub fn resolve<T: Transport>(transport: &T, url: &str, referer: Option<String>) -> Result<Self> {
        validate_url(url)?;
        if let Some(referer) = referer.as_deref() {
            validate_url(referer)?;
        }

        let headers: Vec<(&str, &str)> = referer
            .as_deref()
            .map(|r| vec![("Referer", r)])
            .unwrap_or_default();

        let page = match transport.get(url, &headers) {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(e) if e.status() == Some(404) => return Err(Error::VideoNotFound(url.to_string())),
            Err(e) => return Err(e.into()),
        };

        let video_id = EMBED_ID
            .captures(&page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::VideoNotFound(url.to_string()))?;
        debug!("Resolved {} to video id {}", url, video_id);

        Ok(Self { video_id, referer })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }
}

/// Accept only absolute URLs with a scheme and a host.
pub fn validate_url(value: &str) -> Result<()> {
    match Url::parse(value) {
        Ok(url) if url.has_host() && !url.scheme().is_empty() => Ok(()),
        _ => Err(Error::InvalidUrl(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::http::TransportError;

    struct Page {
        status: Option<u16>,
        body: &'static str,
        seen_headers: RefCell<Vec<(String, String)>>,
    }

    impl Transport for Page {
        fn get(&self, url: &str, headers: &[(&str, &str)]) -> std::result::Result<Vec<u8>, TransportError> {
            self.seen_headers
                .borrow_mut()
                .extend(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())));
            match self.status {
                Some(status) => Err(TransportError::Status {
                    url: url.to_string(),
                    status,
                }),
                None => Ok(self.body.as_bytes().to_vec()),
            }
        }

        fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            _body: &serde_json::Value,
        ) -> std::result::Result<Vec<u8>, TransportError> {
            Err(TransportError::Request {
                url: url.to_string(),
                reason: "unexpected".to_string(),
            })
        }
    }

    fn page(status: Option<u16>, body: &'static str) -> Page {
        Page {
            status,
            body,
            seen_headers: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn extracts_id_and_sends_referer() {
        let transport = page(None, r#"<script>player.init({ id: "f3a9-77", title: "t" })</script>"#);
        let video = VideoIdentity::resolve(
            &transport,
            "https://kinescope.io/embed/123",
            Some("https://school.example/lesson".to_string()),
        )
        .expect("resolve id");

        assert_eq!(video.video_id(), "f3a9-77");
        assert_eq!(video.referer(), Some("https://school.example/lesson"));
        assert_eq!(
            transport.seen_headers.borrow().as_slice(),
            &[("Referer".to_string(), "https://school.example/lesson".to_string())]
        );
    }

    #[test]
    fn missing_page_is_video_not_found() {
        let transport = page(Some(404), "");
        let err = VideoIdentity::resolve(&transport, "https://kinescope.io/embed/1", None)
            .expect_err("404 page");
        assert!(matches!(err, Error::VideoNotFound(_)));
    }

    #[test]
    fn page_without_id_is_video_not_found() {
        let transport = page(None, "<html></html>");
        let err = VideoIdentity::resolve(&transport, "https://kinescope.io/embed/1", None)
            .expect_err("no id");
        assert!(matches!(err, Error::VideoNotFound(_)));
    }

    #[test]
    fn rejects_relative_url() {
        assert!(matches!(validate_url("kinescope.io/embed/1"), Err(Error::InvalidUrl(_))));
        assert!(validate_url("https://kinescope.io/embed/1").is_ok());
    }
}
