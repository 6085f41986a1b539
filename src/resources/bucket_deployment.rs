use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::*;
use crate::error::Result;
use crate::resources::paths::key_prefix;

/// Copies the contents of a local directory into the site bucket.
/// This is not a template resource: it runs once the stacks are deployed.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUpload {
    pub source_dir: PathBuf,
    pub bucket: BucketHandle,
    /// name of the site stack output holding the bucket name,
    /// for buckets whose name is only known after deploying.
    pub bucket_output: String,
    /// `None` uploads to the bucket root
    pub key_prefix: Option<String>,
    /// delete objects under the prefix that are not in `source_dir`
    pub prune: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub key: String,
    pub content_type: &'static str,
}

impl ContentUpload {
    pub fn new(props: &StaticWebsiteProps, bucket: &ResolvedBucket, bucket_output: String) -> Self {
        Self {
            source_dir: props.directory.clone(),
            bucket: bucket.handle.clone(),
            bucket_output,
            key_prefix: key_prefix(props.bucket_content_prefix.as_deref()),
            prune: props.prune,
        }
    }

    /// object key for a path relative to `source_dir`. keys always use `/`.
    pub fn object_key(&self, relative: &Path) -> String {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match &self.key_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), relative),
            None => relative,
        }
    }

    /// the prefix to list when pruning, `""` for the whole bucket
    pub fn list_prefix(&self) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}/", prefix.trim_end_matches('/')),
            None => String::new(),
        }
    }

    /// every file under `source_dir`, sorted by key.
    pub fn collect_files(&self) -> Result<Vec<UploadFile>> {
        let mut out = vec![];
        for entry in WalkDir::new(&self.source_dir).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            let relative = path.strip_prefix(&self.source_dir).unwrap_or(&path);
            out.push(UploadFile {
                key: self.object_key(relative),
                content_type: content_type_for(&path),
                path,
            });
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",
        _ => "application/octet-stream",
    }
}
