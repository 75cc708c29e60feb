//! Image transfer collaborator.
//!
//! The registry protocol, authentication and signature policy live outside
//! this crate. An [`ImageTransfer`] copies `docker://<image>` into a local
//! directory, leaving `manifest.json` plus one blob file per digest behind.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::error::{FetchError, Result};

/// Credentials and transport flags forwarded to the collaborator
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bearer token for the registry
    pub token: Option<String>,
    /// Skip TLS verification
    pub insecure: bool,
    /// Accept any image without consulting the signature policy
    pub insecure_policy: bool,
}

impl TransferOptions {
    /// `user:password`, only when both halves are present and non-empty
    fn credentials(&self) -> Option<String> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(format!("{}:{}", user, pass))
            }
            _ => None,
        }
    }
}

/// Pulls an image into a local directory and returns the manifest bytes it wrote
pub trait ImageTransfer {
    fn transfer(&self, image: &str, dest: &Path, options: &TransferOptions) -> Result<Vec<u8>>;
}

/// Transfer backed by the `skopeo copy` command
#[derive(Debug, Clone)]
pub struct Skopeo {
    program: PathBuf,
}

impl Skopeo {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Skopeo {
            program: program.into(),
        }
    }

    /// Full argument list for one `copy` invocation
    fn args(&self, image: &str, dest: &Path, options: &TransferOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if options.insecure_policy {
            args.push("--insecure-policy".into());
        }
        args.push("copy".into());
        // Force the one manifest type the validator accepts
        args.push("--format".into());
        args.push("v2s2".into());

        if let Some(creds) = options.credentials() {
            args.push("--src-creds".into());
            args.push(creds.into());
        }
        if let Some(token) = options.token.as_deref().filter(|t| !t.is_empty()) {
            args.push("--src-registry-token".into());
            args.push(token.into());
        }
        if options.insecure {
            args.push("--src-tls-verify=false".into());
        }

        args.push(format!("docker://{}", image).into());
        let mut target = OsString::from("dir:");
        target.push(dest.as_os_str());
        args.push(target);
        args
    }
}

impl Default for Skopeo {
    fn default() -> Self {
        Skopeo::new("skopeo")
    }
}

impl ImageTransfer for Skopeo {
    fn transfer(&self, image: &str, dest: &Path, options: &TransferOptions) -> Result<Vec<u8>> {
        info!(image, dest = %dest.display(), "pulling image");

        let status = Command::new(&self.program)
            .args(self.args(image, dest, options))
            .status()
            .map_err(|err| FetchError::Transfer {
                image: image.to_string(),
                reason: format!("run {}: {}", self.program.display(), err),
            })?;

        if !status.success() {
            return Err(FetchError::Transfer {
                image: image.to_string(),
                reason: format!("{} exited with {}", self.program.display(), status),
            });
        }

        let manifest_path = dest.join("manifest.json");
        let data = fs::read(&manifest_path)
            .map_err(|err| FetchError::storage("read manifest file", &manifest_path, err))?;
        debug!(path = %manifest_path.display(), bytes = data.len(), "transfer wrote manifest");
        Ok(data)
    }
}
