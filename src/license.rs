//! ClearKey license acquisition.
//!
//! The key id is read from the manifest, sent to the platform's ClearKey
//! license endpoint, and the returned content key is handed to the decryptor
//! as hex.
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::config::Platform;
use crate::error::{Error, Result};
use crate::http::{Transport, TransportError};
use crate::manifest::Manifest;
use crate::video::VideoIdentity;

const UNSUPPORTED: &str =
    "only the ClearKey encryption type is currently supported, but not the one in this video";

/// Hex-encoded content key, valid for one download run.
#[derive(Clone, PartialEq, Eq)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: &[u8]) -> Self {
        Self(hex::encode(key))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LicenseKey(..)")
    }
}

#[derive(Debug, Deserialize)]
struct LicenseResponse {
    keys: Vec<KeyEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    k: String,
}

/// Client for the platform's ClearKey license endpoint.
pub struct LicenseClient<'a, T> {
    transport: &'a T,
    platform: &'a Platform,
}

impl<'a, T: Transport> LicenseClient<'a, T> {
    pub fn new(transport: &'a T, platform: &'a Platform) -> Self {
        Self {
            transport,
            platform,
        }
    }

    /// Acquire the content key for `video`.
    ///
    /// Returns `Ok(None)` when the first adaptation set of the first period
    /// declares no content protection, i.e. the media is not encrypted.
    pub fn fetch_key(&self, video: &VideoIdentity, manifest: &Manifest) -> Result<Option<LicenseKey>> {
        let set = manifest.first_period()?.adaptation_set(0)?;
        let Some(kid) = set.default_kid()? else {
            debug!("No ContentProtection in MPD, media is not encrypted");
            return Ok(None);
        };

        let url = self.platform.clearkey_license_url(video.video_id());
        let body = serde_json::json!({
            "kids": [encode_kid(kid)?],
            "type": "temporary",
        });
        debug!("Requesting ClearKey license for KID {}", kid);

        let response = match self
            .transport
            .post_json(&url, &[("Origin", self.platform.origin())], &body)
        {
            Ok(response) => response,
            Err(TransportError::Status { status, .. }) => {
                return Err(Error::UnsupportedEncryption(format!(
                    "{} (license server answered {})",
                    UNSUPPORTED, status
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let key = decode_license(&response)?;
        info!("Acquired ClearKey content key");
        Ok(Some(key))
    }
}

/// Normalize a `default_KID` (dashes removed) and encode it as unpadded base64.
pub fn encode_kid(kid: &str) -> Result<String> {
    let normalized: String = kid
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '{' | '}'))
        .collect();
    let raw = hex::decode(normalized)?;
    Ok(STANDARD_NO_PAD.encode(raw))
}

/// Extract `keys[0].k` from a ClearKey license response.
///
/// Anything not shaped like a ClearKey key set means the video uses another
/// DRM scheme.
pub fn decode_license(response: &[u8]) -> Result<LicenseKey> {
    let license: LicenseResponse = serde_json::from_slice(response)
        .map_err(|e| Error::UnsupportedEncryption(format!("{} ({})", UNSUPPORTED, e)))?;
    let entry = license
        .keys
        .first()
        .ok_or_else(|| Error::UnsupportedEncryption(UNSUPPORTED.to_string()))?;

    // `k` may arrive padded or not, in either base64 alphabet.
    let k: String = entry
        .k
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let raw = URL_SAFE_NO_PAD
        .decode(k)
        .map_err(|e| Error::UnsupportedEncryption(format!("{} ({})", UNSUPPORTED, e)))?;
    Ok(LicenseKey::from_bytes(&raw))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct LicenseServer {
        status: Option<u16>,
        response: &'static str,
        requests: RefCell<Vec<(String, Vec<(String, String)>, serde_json::Value)>>,
    }

    impl LicenseServer {
        fn new(status: Option<u16>, response: &'static str) -> Self {
            Self {
                status,
                response,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for LicenseServer {
        fn get(&self, url: &str, _headers: &[(&str, &str)]) -> std::result::Result<Vec<u8>, TransportError> {
            Err(TransportError::Request {
                url: url.to_string(),
                reason: "unexpected GET".to_string(),
            })
        }

        fn post_json(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> std::result::Result<Vec<u8>, TransportError> {
            self.requests.borrow_mut().push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                body.clone(),
            ));
            match self.status {
                Some(status) => Err(TransportError::Status {
                    url: url.to_string(),
                    status,
                }),
                None => Ok(self.response.as_bytes().to_vec()),
            }
        }
    }

    fn manifest(protection: &str) -> Manifest {
        let doc = format!(
            r#"<MPD><Period><AdaptationSet mimeType="audio/mp4">{}
                <Representation><BaseURL>a/</BaseURL></Representation>
            </AdaptationSet></Period></MPD>"#,
            protection
        );
        Manifest::parse(&doc).expect("parse mpd")
    }

    const PROTECTED: &str = r#"<ContentProtection schemeIdUri="urn:mpeg:dash:mp4protection:2011" cenc:default_KID="aabbccdd"/>"#;

    #[test]
    fn kid_is_normalized_and_unpadded() {
        assert_eq!(encode_kid("aabbccdd").expect("encode"), "qrvM3Q");
        assert_eq!(encode_kid("aa-bb-cc-dd").expect("encode"), "qrvM3Q");
        assert!(matches!(encode_kid("zz"), Err(Error::HexDecodeError(_))));
    }

    #[test]
    fn unprotected_manifest_has_no_key() {
        let server = LicenseServer::new(None, "{}");
        let platform = Platform::default();
        let client = LicenseClient::new(&server, &platform);
        let key = client
            .fetch_key(&VideoIdentity::new("vid", None), &manifest(""))
            .expect("fetch key");

        assert!(key.is_none());
        assert!(server.requests.borrow().is_empty());
    }

    #[test]
    fn clearkey_exchange() {
        let server = LicenseServer::new(None, r#"{"keys":[{"k":"cXdlcnR5","kty":"oct"}],"type":"temporary"}"#);
        let platform = Platform::default();
        let client = LicenseClient::new(&server, &platform);
        let key = client
            .fetch_key(&VideoIdentity::new("vid", None), &manifest(PROTECTED))
            .expect("fetch key")
            .expect("key present");

        assert_eq!(key.as_hex(), hex::encode(b"qwerty"));

        let requests = server.requests.borrow();
        let (url, headers, body) = &requests[0];
        assert_eq!(
            url,
            "https://license.kinescope.io/v1/vod/vid/acquire/clearkey?token="
        );
        assert_eq!(
            headers,
            &vec![("Origin".to_string(), "https://kinescope.io".to_string())]
        );
        assert_eq!(
            body,
            &serde_json::json!({"kids": ["qrvM3Q"], "type": "temporary"})
        );
    }

    #[test]
    fn url_safe_and_padded_keys_decode_alike() {
        let padded = decode_license(br#"{"keys":[{"k":"-_8="}]}"#).expect("decode");
        let standard = decode_license(br#"{"keys":[{"k":"+/8"}]}"#).expect("decode");
        assert_eq!(padded, standard);
        assert_eq!(padded.as_hex(), "fbff");
    }

    #[test]
    fn unexpected_shape_is_unsupported_encryption() {
        for response in [
            r#"{"keys":[]}"#,
            r#"{"error":"widevine"}"#,
            "not json",
            r#"{"keys":[{"k":"not*base64!"}]}"#,
        ] {
            let err = decode_license(response.as_bytes()).expect_err("bad license");
            assert!(matches!(err, Error::UnsupportedEncryption(_)), "{}", response);
        }
    }

    #[test]
    fn license_rejection_is_unsupported_encryption() {
        let server = LicenseServer::new(Some(403), "");
        let platform = Platform::default();
        let client = LicenseClient::new(&server, &platform);
        let err = client
            .fetch_key(&VideoIdentity::new("vid", None), &manifest(PROTECTED))
            .expect_err("rejected");
        assert!(matches!(err, Error::UnsupportedEncryption(_)));
    }
}
