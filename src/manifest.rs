use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};

pub const DOCKER_V2_SCHEMA_VERSION: i64 = 2;
pub const DOCKER_V2_SCHEMA2_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_V2_SCHEMA2_LAYER_MEDIA_TYPE: &str =
    "application/vnd.docker.image.rootfs.diff.tar.gzip";

pub const SHA256_PREFIX: &str = "sha256:";

/// Docker image manifest, schema 2.
///
/// Every field but `schemaVersion` defaults when absent so that documents of
/// another shape parse and are then rejected by [`validate`] on the field that
/// differs, not as malformed JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,

    #[serde(rename = "mediaType", default)]
    pub media_type: String,

    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// One compressed layer blob referenced by the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(rename = "mediaType", default)]
    pub media_type: String,

    /// Declared size, informational only
    #[serde(default)]
    #[allow(dead_code)]
    pub size: i64,

    #[serde(default)]
    pub digest: String,
}

impl Layer {
    /// Blob file name inside a cache entry: the digest without its algorithm prefix
    pub fn blob_name(&self) -> &str {
        self.digest
            .strip_prefix(SHA256_PREFIX)
            .unwrap_or(&self.digest)
    }
}

/// Parse and type-check manifest bytes against the one accepted schema
pub fn validate(raw: &[u8]) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_slice(raw).map_err(|source| FetchError::MalformedManifest {
            raw: String::from_utf8_lossy(raw).into_owned(),
            source,
        })?;

    if manifest.schema_version != DOCKER_V2_SCHEMA_VERSION {
        return Err(FetchError::unsupported(
            "schema version",
            DOCKER_V2_SCHEMA_VERSION,
            manifest.schema_version,
        ));
    }

    if manifest.media_type != DOCKER_V2_SCHEMA2_MEDIA_TYPE {
        return Err(FetchError::unsupported(
            "media type",
            format!("{:?}", DOCKER_V2_SCHEMA2_MEDIA_TYPE),
            format!("{:?}", manifest.media_type),
        ));
    }

    for layer in &manifest.layers {
        if layer.media_type != DOCKER_V2_SCHEMA2_LAYER_MEDIA_TYPE {
            return Err(FetchError::unsupported(
                "layer media type",
                format!("{:?}", DOCKER_V2_SCHEMA2_LAYER_MEDIA_TYPE),
                format!("{:?}", layer.media_type),
            ));
        }
        if !layer.digest.starts_with(SHA256_PREFIX) {
            return Err(FetchError::unsupported(
                "layer digest",
                "sha256",
                format!("{:?}", layer.digest),
            ));
        }
    }

    Ok(manifest)
}
