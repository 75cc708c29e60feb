//! Helpers for building synthetic layers and cache entries in tests

use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::Cell;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::manifest::{DOCKER_V2_SCHEMA2_LAYER_MEDIA_TYPE, DOCKER_V2_SCHEMA2_MEDIA_TYPE};
use crate::transfer::{ImageTransfer, TransferOptions};

/// One entry in a synthetic layer
pub enum Entry<'a> {
    File(&'a str, &'a [u8], u32),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
}

/// Build a gzip-compressed tar from `entries`
pub fn build_layer(entries: &[Entry]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        for entry in entries {
            let mut header = tar::Header::new_gnu();
            match *entry {
                Entry::File(name, data, mode) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(data.len() as u64);
                    header.set_mode(mode);
                    append_raw_name(&mut builder, &mut header, name, data);
                }
                Entry::Dir(name) => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    append_raw_name(&mut builder, &mut header, name, &[][..]);
                }
                Entry::Symlink(name, target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    header.set_link_name(target).unwrap();
                    append_raw_name(&mut builder, &mut header, name, &[][..]);
                }
            }
        }
        builder.finish().unwrap();
    }
    encoder.finish().unwrap()
}

/// Write the entry name straight into the header so names like `../x` survive
fn append_raw_name<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    header: &mut tar::Header,
    name: &str,
    data: &[u8],
) {
    let bytes = name.as_bytes();
    let field = &mut header.as_old_mut().name;
    assert!(bytes.len() < field.len(), "test entry name too long");
    field[..bytes.len()].copy_from_slice(bytes);
    header.set_cksum();
    builder.append(header, data).unwrap();
}

/// Deterministic fake sha256 digest for a blob label
pub fn digest_for(label: &str) -> String {
    let hex = hex::encode(label.as_bytes());
    format!("sha256:{:0<64}", hex)
}

/// Manifest JSON referencing one layer per digest
pub fn manifest_json(digests: &[String]) -> String {
    let layers: Vec<String> = digests
        .iter()
        .map(|digest| {
            format!(
                r#"{{"mediaType": "{}", "size": 1, "digest": "{}"}}"#,
                DOCKER_V2_SCHEMA2_LAYER_MEDIA_TYPE, digest
            )
        })
        .collect();
    format!(
        r#"{{"schemaVersion": 2, "mediaType": "{}", "layers": [{}]}}"#,
        DOCKER_V2_SCHEMA2_MEDIA_TYPE,
        layers.join(", ")
    )
}

/// In-memory transfer that writes a fixed image and counts invocations
pub struct FakeTransfer {
    pub manifest: String,
    pub blobs: Vec<(String, Vec<u8>)>,
    pub calls: Cell<usize>,
}

impl FakeTransfer {
    /// Image whose layers are the given (label, layer bytes) pairs, in order
    pub fn new(layers: Vec<(&str, Vec<u8>)>) -> Self {
        let blobs: Vec<(String, Vec<u8>)> = layers
            .into_iter()
            .map(|(label, data)| (digest_for(label), data))
            .collect();
        let digests: Vec<String> = blobs.iter().map(|(d, _)| d.clone()).collect();
        FakeTransfer {
            manifest: manifest_json(&digests),
            blobs,
            calls: Cell::new(0),
        }
    }
}

impl ImageTransfer for FakeTransfer {
    fn transfer(&self, _image: &str, dest: &Path, _options: &TransferOptions) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        for (digest, data) in &self.blobs {
            let name = digest.trim_start_matches("sha256:");
            fs::write(dest.join(name), data).unwrap();
        }
        fs::write(dest.join("manifest.json"), &self.manifest).unwrap();
        Ok(self.manifest.clone().into_bytes())
    }
}
