//! Unified configuration for rigup.
//!
//! Configuration is read once from `rigup.toml` at startup, resolved into an
//! immutable [`RigConfig`], and passed by reference into the sequencer and
//! supervisor. Every field has a default so an absent file yields a working
//! configuration.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! workspace = "~/rigup"
//!
//! [toolchain]
//! enabled = true
//! check = "nvcc"
//! min_version = "12.0"
//! installer = "apt-get install -y cuda-toolkit"
//!
//! [build]
//! source_repo = "https://github.com/ggml-org/llama.cpp"
//! cmake_flags = ["-DGGML_CUDA=ON"]
//!
//! [model]
//! repo = "Qwen/Qwen2.5-72B-Instruct-GGUF"
//! include = "*q4_k_m*.gguf"
//! expected_shards = 11
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ctx_size = 16384
//! gpu_layers = 999
//! tensor_split = "0.5,0.5"
//! ready_timeout_secs = 900
//! poll_interval_ms = 2000
//!
//! [webui]
//! enabled = true
//! image = "ghcr.io/open-webui/open-webui:main"
//! container = "open-webui"
//! port = 3000
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RigToml {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webui: WebUiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for the checkout, model shards, logs, pidfile, and run records.
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
        }
    }
}

fn default_workspace() -> String {
    "~/rigup".to_string()
}

/// GPU toolchain presence and installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Executable whose presence (and version) proves the toolchain is there.
    #[serde(default = "default_toolchain_check")]
    pub check: String,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Minimum `major.minor`; `None` accepts any version.
    #[serde(default = "default_min_version")]
    pub min_version: Option<String>,
    /// Shell command that installs the toolchain. Runs with root privilege.
    #[serde(default = "default_installer")]
    pub installer: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check: default_toolchain_check(),
            version_args: default_version_args(),
            min_version: default_min_version(),
            installer: default_installer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_toolchain_check() -> String {
    "nvcc".to_string()
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_min_version() -> Option<String> {
    Some("12.0".to_string())
}

fn default_installer() -> String {
    "apt-get update && apt-get install -y cuda-toolkit".to_string()
}

/// Source build of the inference server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_source_repo")]
    pub source_repo: String,
    #[serde(default = "default_cmake_flags")]
    pub cmake_flags: Vec<String>,
    /// Parallel build jobs; `None` lets the build tool decide.
    #[serde(default)]
    pub jobs: Option<u32>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_repo: default_source_repo(),
            cmake_flags: default_cmake_flags(),
            jobs: None,
        }
    }
}

fn default_source_repo() -> String {
    "https://github.com/ggml-org/llama.cpp".to_string()
}

fn default_cmake_flags() -> Vec<String> {
    vec!["-DGGML_CUDA=ON".to_string()]
}

/// Model weight retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hugging Face repository id.
    #[serde(default = "default_model_repo")]
    pub repo: String,
    /// Glob selecting the shard files, used both for the downloader's include
    /// filter and for counting what landed locally.
    #[serde(default = "default_model_include")]
    pub include: String,
    /// Number of files the shard set consists of when complete.
    #[serde(default = "default_expected_shards")]
    pub expected_shards: usize,
    /// Downloader CLI. Must skip already-complete shards on re-invocation.
    #[serde(default = "default_downloader")]
    pub downloader: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo: default_model_repo(),
            include: default_model_include(),
            expected_shards: default_expected_shards(),
            downloader: default_downloader(),
        }
    }
}

fn default_model_repo() -> String {
    "Qwen/Qwen2.5-72B-Instruct-GGUF".to_string()
}

fn default_model_include() -> String {
    "*q4_k_m*.gguf".to_string()
}

fn default_expected_shards() -> usize {
    11
}

fn default_downloader() -> String {
    "hf".to_string()
}

/// Inference server launch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binary; `None` uses the one produced by the build step.
    #[serde(default)]
    pub binary: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_ctx_size")]
    pub ctx_size: u32,
    /// Layers offloaded to the GPU; a large value offloads everything.
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,
    /// Tensor distribution across devices, e.g. "0.5,0.5".
    #[serde(default)]
    pub tensor_split: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace period for a stale instance between SIGTERM and SIGKILL.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            host: default_host(),
            port: default_server_port(),
            ctx_size: default_ctx_size(),
            gpu_layers: default_gpu_layers(),
            tensor_split: None,
            extra_args: Vec::new(),
            ready_timeout_secs: default_ready_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            grace_secs: default_grace_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_ctx_size() -> u32 {
    16384
}

fn default_gpu_layers() -> u32 {
    999
}

fn default_ready_timeout_secs() -> u64 {
    900
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_grace_secs() -> u64 {
    10
}

/// Chat web UI container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_webui_image")]
    pub image: String,
    #[serde(default = "default_webui_container")]
    pub container: String,
    #[serde(default = "default_webui_port")]
    pub port: u16,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image: default_webui_image(),
            container: default_webui_container(),
            port: default_webui_port(),
        }
    }
}

fn default_webui_image() -> String {
    "ghcr.io/open-webui/open-webui:main".to_string()
}

fn default_webui_container() -> String {
    "open-webui".to_string()
}

fn default_webui_port() -> u16 {
    3000
}

impl RigToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load from `path` when it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// The resolved, immutable runtime view of the configuration: absolute paths
/// and derived locations. Constructed once at startup.
#[derive(Debug, Clone)]
pub struct RigConfig {
    pub toml: RigToml,
    pub workspace: PathBuf,
    pub checkout_dir: PathBuf,
    pub model_dir: PathBuf,
    pub log_dir: PathBuf,
    pub runs_dir: PathBuf,
}

impl RigConfig {
    pub fn resolve(toml: RigToml) -> Result<Self> {
        let workspace = expand_tilde(&toml.paths.workspace);
        Ok(Self {
            checkout_dir: workspace.join("llama.cpp"),
            model_dir: workspace.join("models"),
            log_dir: workspace.join("logs"),
            runs_dir: workspace.join("runs"),
            workspace,
            toml,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.workspace, &self.model_dir, &self.log_dir, &self.runs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn pidfile(&self) -> PathBuf {
        self.workspace.join("llama-server.pid")
    }

    pub fn server_log(&self) -> PathBuf {
        self.log_dir.join("llama-server.log")
    }

    pub fn build_log(&self) -> PathBuf {
        self.log_dir.join("build.log")
    }

    pub fn download_log(&self) -> PathBuf {
        self.log_dir.join("download.log")
    }

    pub fn install_log(&self) -> PathBuf {
        self.log_dir.join("install.log")
    }

    /// Path of the server binary: configured override or the build output.
    pub fn server_binary(&self) -> PathBuf {
        match &self.toml.server.binary {
            Some(path) => expand_tilde(path),
            None => self.checkout_dir.join("build/bin/llama-server"),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.toml.server.host, self.toml.server.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.server_url())
    }

    pub fn webui_url(&self) -> String {
        format!("http://localhost:{}", self.toml.webui.port)
    }

    /// Base URL the chat UI container uses to reach the server on the host.
    pub fn webui_backend_url(&self) -> String {
        format!(
            "http://host.docker.internal:{}/v1",
            self.toml.server.port
        )
    }

    /// Argument vector for the inference server.
    pub fn server_args(&self, model_path: &Path) -> Vec<String> {
        let s = &self.toml.server;
        let mut args = vec![
            "-m".to_string(),
            model_path.display().to_string(),
            "--host".to_string(),
            s.host.clone(),
            "--port".to_string(),
            s.port.to_string(),
            "-c".to_string(),
            s.ctx_size.to_string(),
            "-ngl".to_string(),
            s.gpu_layers.to_string(),
        ];
        if let Some(ts) = &s.tensor_split {
            args.push("-ts".to_string());
            args.push(ts.clone());
        }
        args.extend(s.extra_args.iter().cloned());
        args
    }

    /// Non-fatal configuration warnings, reported before a run starts.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.toml.model.expected_shards == 0 {
            warnings.push("model.expected_shards is 0; the fetch step will never run".to_string());
        }
        if self.toml.webui.enabled && self.toml.webui.port == self.toml.server.port {
            warnings.push(format!(
                "webui.port and server.port are both {}; the container will fail to bind",
                self.toml.server.port
            ));
        }
        if self.toml.server.ready_timeout_secs == 0 {
            warnings.push(
                "server.ready_timeout_secs is 0; readiness will be reported as timed out"
                    .to_string(),
            );
        }
        if self.toml.server.poll_interval_ms == 0 {
            warnings.push("server.poll_interval_ms is 0; the health endpoint will be hammered".to_string());
        }
        warnings
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_toml_yields_full_defaults() {
        let toml: RigToml = toml::from_str("").unwrap();
        assert!(toml.toolchain.enabled);
        assert_eq!(toml.toolchain.check, "nvcc");
        assert_eq!(toml.model.expected_shards, 11);
        assert_eq!(toml.server.port, 8080);
        assert_eq!(toml.webui.container, "open-webui");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml: RigToml = toml::from_str(
            r#"
            [server]
            port = 9090
            tensor_split = "0.6,0.4"
            "#,
        )
        .unwrap();
        assert_eq!(toml.server.port, 9090);
        assert_eq!(toml.server.tensor_split.as_deref(), Some("0.6,0.4"));
        assert_eq!(toml.server.ctx_size, 16384);
        assert!(toml.webui.enabled);
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = RigToml::load_or_default(&dir.path().join("rigup.toml")).unwrap();
        assert_eq!(toml.server.port, 8080);
    }

    #[test]
    fn load_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rigup.toml");
        fs::write(&path, "{ not toml }").unwrap();
        let err = RigToml::load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rigup.toml");
        let mut toml = RigToml::default();
        toml.server.port = 9191;
        toml.model.expected_shards = 4;
        toml.save(&path).unwrap();

        let loaded = RigToml::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9191);
        assert_eq!(loaded.model.expected_shards, 4);
    }

    #[test]
    fn resolve_derives_workspace_paths() {
        let mut toml = RigToml::default();
        toml.paths.workspace = "/opt/rig".to_string();
        let config = RigConfig::resolve(toml).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/opt/rig/models"));
        assert_eq!(config.server_log(), PathBuf::from("/opt/rig/logs/llama-server.log"));
        assert_eq!(config.pidfile(), PathBuf::from("/opt/rig/llama-server.pid"));
        assert_eq!(
            config.server_binary(),
            PathBuf::from("/opt/rig/llama.cpp/build/bin/llama-server")
        );
    }

    #[test]
    fn expand_tilde_uses_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/rig"), home.join("rig"));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn server_args_include_configured_flags() {
        let mut toml = RigToml::default();
        toml.server.tensor_split = Some("0.5,0.5".to_string());
        toml.server.extra_args = vec!["--flash-attn".to_string()];
        let config = RigConfig::resolve(toml).unwrap();

        let args = config.server_args(Path::new("/m/model-00001-of-00011.gguf"));
        let joined = args.join(" ");
        assert!(joined.contains("-m /m/model-00001-of-00011.gguf"));
        assert!(joined.contains("--host 127.0.0.1"));
        assert!(joined.contains("--port 8080"));
        assert!(joined.contains("-c 16384"));
        assert!(joined.contains("-ngl 999"));
        assert!(joined.contains("-ts 0.5,0.5"));
        assert!(joined.ends_with("--flash-attn"));
    }

    #[test]
    fn validate_flags_port_clash_and_zero_shards() {
        let mut toml = RigToml::default();
        toml.webui.port = toml.server.port;
        toml.model.expected_shards = 0;
        let config = RigConfig::resolve(toml).unwrap();

        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("expected_shards")));
        assert!(warnings.iter().any(|w| w.contains("fail to bind")));
    }

    #[test]
    fn validate_clean_config_has_no_warnings() {
        let config = RigConfig::resolve(RigToml::default()).unwrap();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn urls_are_derived_from_server_section() {
        let config = RigConfig::resolve(RigToml::default()).unwrap();
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
        assert_eq!(config.health_url(), "http://127.0.0.1:8080/health");
        assert_eq!(config.webui_url(), "http://localhost:3000");
        assert_eq!(
            config.webui_backend_url(),
            "http://host.docker.internal:8080/v1"
        );
    }
}
