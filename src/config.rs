//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::ConfigError;
use crate::oracle::gemini::{self, GeminiBackend};
use crate::oracle::Backend;

#[derive(Parser, Debug)]
#[command(author, version, about = "Walk a conversation tree, letting an LLM judge each reply", long_about = None)]
pub struct Cli {
    /// Conversation tree definition (JSON array of nodes)
    #[arg(long, env = "FLOWCHAT_TREE", default_value = "conversation_tree.json", global = true)]
    pub tree: PathBuf,

    /// Starting node id. Defaults to the first node in the tree file
    #[arg(long, env = "FLOWCHAT_ROOT", global = true)]
    pub root: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chat through the tree (default)
    Chat,
    /// Load and validate the tree, then print a structural report
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Presentation style
    #[arg(long, value_enum, default_value_t = Mode::Line, global = true)]
    pub mode: Mode,

    /// Which model answers the yes/no questions
    #[arg(long, value_enum, default_value_t = BackendKind::Gemini, global = true)]
    pub backend: BackendKind,

    /// Gemini model identifier
    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Upper bound on a single oracle call, in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// GGUF model file for the llama backend
    #[arg(long, env = "FLOWCHAT_MODEL_PATH", global = true)]
    pub model_path: Option<PathBuf>,

    /// Layers to offload to GPU with the llama backend (0 = CPU only)
    #[arg(long, default_value_t = 0, global = true)]
    pub gpu_layers: u32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Line-oriented request/response
    Line,
    /// Redraw the whole transcript on every turn
    Retained,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    Llama,
}

impl ChatArgs {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "--timeout-secs",
                message: "must be at least 1".into(),
            });
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }

    /// Build the oracle backend. Missing credentials are fatal here, before
    /// any conversation starts.
    pub fn build_backend(&self) -> Result<Box<dyn Backend>, ConfigError> {
        let timeout = self.timeout()?;
        match self.backend {
            BackendKind::Gemini => {
                let backend = GeminiBackend::from_env(&self.model, timeout)?;
                log::info!("Using Gemini model {}", backend.model_name());
                Ok(Box::new(backend))
            }
            BackendKind::Llama => self.build_llama(),
        }
    }

    #[cfg(feature = "llama")]
    fn build_llama(&self) -> Result<Box<dyn Backend>, ConfigError> {
        use crate::oracle::llama::{LocalLlama, ModelConfig};

        let path = self.model_path.as_ref().ok_or(ConfigError::InvalidSetting {
            name: "--model-path",
            message: "required with --backend llama".into(),
        })?;
        let config = ModelConfig {
            n_gpu_layers: self.gpu_layers,
            timeout: self.timeout()?,
            ..ModelConfig::default()
        };
        Ok(Box::new(LocalLlama::load_model(
            &path.to_string_lossy(),
            config,
        )?))
    }

    #[cfg(not(feature = "llama"))]
    fn build_llama(&self) -> Result<Box<dyn Backend>, ConfigError> {
        Err(ConfigError::InvalidSetting {
            name: "--backend",
            message: "llama support was not compiled in (rebuild with --features llama)".into(),
        })
    }
}
