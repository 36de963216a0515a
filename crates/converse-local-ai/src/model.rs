//! Model download and management.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::LocalAIError;
use crate::paths;

/// File extensions recognized as installed models.
pub const MODEL_EXTENSIONS: &[&str] = &["gguf", "onnx"];

/// Downloadable model description.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model id; also the file stem on disk.
    pub name: String,
    /// Filename on disk.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Expected SHA256 checksum (optional).
    pub sha256: Option<String>,
    /// Size in bytes (for progress display).
    pub size_bytes: Option<u64>,
}

impl ModelInfo {
    /// Describe a GGUF model published at `url`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            filename: format!("{}.gguf", name),
            name,
            url: url.into(),
            sha256: None,
            size_bytes: None,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

/// A model file found in the models directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModel {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Manager for downloading and managing models.
#[derive(Debug, Clone)]
pub struct ModelManager {
    client: reqwest::Client,
    models_dir: PathBuf,
}

fn has_model_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MODEL_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

impl ModelManager {
    /// Create a manager over the default models directory.
    pub fn new() -> Self {
        Self::with_dir(paths::models_dir())
    }

    /// Create a manager over a specific models directory.
    pub fn with_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// List all installed models, sorted by name.
    pub fn list_installed(&self) -> Result<Vec<InstalledModel>, LocalAIError> {
        if !self.models_dir.exists() {
            return Ok(vec![]);
        }

        let mut models: Vec<InstalledModel> = fs::read_dir(&self.models_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| has_model_extension(&entry.path()))
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_stem()?.to_str()?.to_string();
                let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
                Some(InstalledModel {
                    name,
                    path,
                    size_bytes,
                })
            })
            .collect();

        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    /// Locate the installed file for a model id.
    ///
    /// `model_id` may be a bare name (`tiny`) or a filename (`tiny.gguf`).
    pub fn find(&self, model_id: &str) -> Option<PathBuf> {
        let direct = self.models_dir.join(model_id);
        if has_model_extension(&direct) && direct.is_file() {
            return Some(direct);
        }

        MODEL_EXTENSIONS
            .iter()
            .map(|ext| self.models_dir.join(format!("{}.{}", model_id, ext)))
            .find(|path| path.is_file())
    }

    /// Check if a model is installed.
    pub fn is_installed(&self, model_id: &str) -> bool {
        self.find(model_id).is_some()
    }

    /// Download a model from its URL.
    ///
    /// Returns the existing path without downloading when the model is
    /// already installed.
    pub async fn download(&self, model: &ModelInfo) -> Result<PathBuf, LocalAIError> {
        let dest_path = self.models_dir.join(&model.filename);
        if dest_path.is_file() {
            debug!("Model '{}' already installed at {:?}", model.name, dest_path);
            return Ok(dest_path);
        }

        fs::create_dir_all(&self.models_dir)?;
        info!("Downloading model '{}' to {:?}", model.name, dest_path);

        let response = self
            .client
            .get(&model.url)
            .send()
            .await
            .map_err(|e| LocalAIError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocalAIError::DownloadFailed(format!(
                "HTTP {}: {}",
                response.status(),
                model.url
            )));
        }

        let total_size = response.content_length().or(model.size_bytes);
        let pb = progress_bar(total_size);

        // Stream into a partial file so an interrupted download never looks installed
        let partial_path = dest_path.with_extension("part");
        let mut file = File::create(&partial_path)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = fs::remove_file(&partial_path);
                    return Err(LocalAIError::DownloadFailed(e.to_string()));
                }
            };
            file.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;
        drop(file);

        pb.finish_with_message("Download complete");

        if let Some(expected) = &model.sha256 {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = fs::remove_file(&partial_path);
                return Err(LocalAIError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified: {}", actual);
        }

        fs::rename(&partial_path, &dest_path)?;
        info!("Model '{}' downloaded successfully", model.name);
        Ok(dest_path)
    }

    /// Install a model from a local file path.
    pub fn install_from_path(&self, source: &Path) -> Result<PathBuf, LocalAIError> {
        if !has_model_extension(source) {
            return Err(LocalAIError::UnsupportedFormat(source.display().to_string()));
        }

        let filename = source
            .file_name()
            .ok_or_else(|| LocalAIError::ModelNotFound(source.display().to_string()))?;

        fs::create_dir_all(&self.models_dir)?;
        let dest_path = self.models_dir.join(filename);

        if source == dest_path {
            return Ok(dest_path);
        }

        info!("Installing model from {:?} to {:?}", source, dest_path);
        fs::copy(source, &dest_path)?;

        Ok(dest_path)
    }

    /// Remove an installed model. Returns whether a file was deleted.
    pub fn remove(&self, model_id: &str) -> Result<bool, LocalAIError> {
        match self.find(model_id) {
            Some(path) => {
                fs::remove_file(&path)?;
                info!("Removed model: {}", model_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
            {
                pb.set_style(style);
            }
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_list_installed_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("zeta.gguf"), b"zz").unwrap();
        fs::write(dir.path().join("alpha.onnx"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let manager = ModelManager::with_dir(dir.path());
        let models = manager.list_installed().unwrap();

        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(models[1].size_bytes, 2);
    }

    #[test]
    fn test_list_installed_missing_dir() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().join("nope"));
        assert!(manager.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_find_by_name_or_filename() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tiny.gguf"), b"x").unwrap();
        let manager = ModelManager::with_dir(dir.path());

        assert_eq!(manager.find("tiny"), Some(dir.path().join("tiny.gguf")));
        assert_eq!(manager.find("tiny.gguf"), Some(dir.path().join("tiny.gguf")));
        assert_eq!(manager.find("other"), None);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tiny.gguf"), b"x").unwrap();
        let manager = ModelManager::with_dir(dir.path());

        assert!(manager.remove("tiny").unwrap());
        assert!(!manager.is_installed("tiny"));
        assert!(!manager.remove("tiny").unwrap());
    }

    #[test]
    fn test_install_from_path_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("weights.bin");
        fs::write(&source, b"x").unwrap();

        let manager = ModelManager::with_dir(dir.path().join("models"));
        let err = manager.install_from_path(&source).unwrap_err();
        assert!(matches!(err, LocalAIError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_install_from_path_copies() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("tiny.gguf");
        fs::write(&source, b"weights").unwrap();

        let manager = ModelManager::with_dir(dir.path().join("models"));
        let dest = manager.install_from_path(&source).unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"weights");
        assert!(manager.is_installed("tiny"));
    }

    #[tokio::test]
    async fn test_download_verifies_checksum() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tiny.gguf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"model-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path());
        let expected = hex::encode(Sha256::digest(b"model-bytes"));
        let model = ModelInfo::new("tiny", format!("{}/tiny.gguf", server.uri())).with_sha256(expected);

        let dest = manager.download(&model).await.unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"model-bytes");
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_leaves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tiny.gguf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path());
        let model =
            ModelInfo::new("tiny", format!("{}/tiny.gguf", server.uri())).with_sha256("00ff");

        let err = manager.download(&model).await.unwrap_err();
        assert!(matches!(err, LocalAIError::ChecksumMismatch { .. }));
        assert!(!manager.is_installed("tiny"));
        assert!(!dir.path().join("tiny.part").exists());
    }

    #[tokio::test]
    async fn test_download_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path());
        let model = ModelInfo::new("tiny", format!("{}/tiny.gguf", server.uri()));

        let err = manager.download(&model).await.unwrap_err();
        assert!(matches!(err, LocalAIError::DownloadFailed(_)));
    }
}
