//! Artifact reference parsing.
//!
//! Inbound jobs may point at objects either as `s3://bucket/key` or as
//! virtual-hosted `https://bucket.<public host>/key` URLs. Outbound
//! references are always rendered in the `https://` form.

use std::fmt;

use url::Url;

use crate::error::{StorageError, StorageResult};

/// Public host used for virtual-hosted S3 URLs.
pub const DEFAULT_PUBLIC_HOST: &str = "s3.amazonaws.com";

/// A resolved bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub bucket: String,
    pub key: String,
}

impl ArtifactRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an inbound reference.
    ///
    /// `public_host` is the suffix after the bucket name in `https://` URLs.
    pub fn parse(raw: &str, public_host: &str) -> StorageResult<Self> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|_| StorageError::invalid_reference(raw))?;

        let bucket = match url.scheme() {
            "s3" => url
                .host_str()
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .ok_or_else(|| StorageError::invalid_reference(raw))?,
            "https" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| StorageError::invalid_reference(raw))?;
                let suffix = format!(".{}", public_host.to_ascii_lowercase());
                host.strip_suffix(&suffix)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| StorageError::invalid_reference(raw))?
            }
            _ => return Err(StorageError::invalid_reference(raw)),
        };

        let key = urlencoding::decode(url.path().trim_start_matches('/'))
            .map_err(|_| StorageError::invalid_reference(raw))?
            .into_owned();
        if key.is_empty() || key.ends_with('/') {
            return Err(StorageError::invalid_reference(raw));
        }

        Ok(Self { bucket, key })
    }

    /// Render the canonical outbound `https://` reference.
    pub fn to_https(&self, public_host: &str) -> String {
        let encoded: Vec<String> = self
            .key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("https://{}.{}/{}", self.bucket, public_host, encoded.join("/"))
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_scheme() {
        let r = ArtifactRef::parse("s3://docs-bucket/uploads/u1/report.pdf", DEFAULT_PUBLIC_HOST)
            .unwrap();
        assert_eq!(r.bucket, "docs-bucket");
        assert_eq!(r.key, "uploads/u1/report.pdf");
        assert_eq!(r.file_name(), "report.pdf");
    }

    #[test]
    fn test_parse_https_virtual_host() {
        let r = ArtifactRef::parse(
            "https://docs-bucket.s3.amazonaws.com/uploads/my%20scan.png",
            DEFAULT_PUBLIC_HOST,
        )
        .unwrap();
        assert_eq!(r.bucket, "docs-bucket");
        assert_eq!(r.key, "uploads/my scan.png");
    }

    #[test]
    fn test_parse_custom_public_host() {
        let r = ArtifactRef::parse("https://b.files.example.com/k.pdf", "files.example.com").unwrap();
        assert_eq!(r, ArtifactRef::new("b", "k.pdf"));
    }

    #[test]
    fn test_rejects_unknown_forms() {
        for raw in [
            "",
            "ref1",
            "/tmp/local.pdf",
            "http://b.s3.amazonaws.com/k.pdf",
            "https://example.com/k.pdf",
            "https://s3.amazonaws.com/k.pdf",
            "s3://bucket-only",
            "s3://bucket/",
            "ftp://b/k",
        ] {
            assert!(
                ArtifactRef::parse(raw, DEFAULT_PUBLIC_HOST).is_err(),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_https_rendering_reparses() {
        let original = ArtifactRef::new("b", "processed/j1/merged file.pdf");
        let rendered = original.to_https(DEFAULT_PUBLIC_HOST);

        assert_eq!(
            rendered,
            "https://b.s3.amazonaws.com/processed/j1/merged%20file.pdf"
        );
        assert_eq!(
            ArtifactRef::parse(&rendered, DEFAULT_PUBLIC_HOST).unwrap(),
            original
        );
    }
}
