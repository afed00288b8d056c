use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::StorageError;

/// Root of an input or output dataset.
///
/// `s3://`, `s3a://` and `s3n://` URLs address a bucket (plus optional key
/// prefix); `file://` URLs and plain paths address a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    S3 { bucket: String, prefix: String },
    Local(PathBuf),
}

impl Location {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StorageError::InvalidLocation("empty location".into()));
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            // Relative paths like ./Results/ are not URLs.
            Err(_) => return Ok(Location::Local(PathBuf::from(raw))),
        };

        match url.scheme() {
            "s3" | "s3a" | "s3n" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| StorageError::InvalidLocation(format!("no bucket in {raw}")))?;
                Ok(Location::S3 {
                    bucket: bucket.to_string(),
                    prefix: url.path().trim_matches('/').to_string(),
                })
            }
            "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| StorageError::InvalidLocation(format!("bad file URL {raw}"))),
            // Windows drive letters parse as one-letter schemes.
            s if s.len() == 1 => Ok(Location::Local(PathBuf::from(raw))),
            other => Err(StorageError::InvalidLocation(format!(
                "unsupported scheme '{other}' in {raw}"
            ))),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::S3 { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::S3 { bucket, prefix } if prefix.is_empty() => write!(f, "s3://{bucket}/"),
            Location::S3 { bucket, prefix } => write!(f, "s3://{bucket}/{prefix}/"),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
