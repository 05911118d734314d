use std::path::{Path, PathBuf};

use candle_core::Device;
use tokenizers::Tokenizer;

use crate::error::LlmError;

/// Local paths of the three files every supported model needs.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Where model files come from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    Local { dir: PathBuf },
    HuggingFace { repo_id: String },
}

impl ModelSource {
    /// Treat `location` as a local directory when it exists, otherwise as a hub repo id.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let path = Path::new(location);
        if path.is_dir() {
            Self::Local {
                dir: path.to_path_buf(),
            }
        } else {
            Self::HuggingFace {
                repo_id: location.to_owned(),
            }
        }
    }

    /// Resolve the model files, downloading them from the hub if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ModelLoad`] if a file is missing or cannot be fetched.
    pub fn fetch(&self) -> Result<ModelFiles, LlmError> {
        match self {
            Self::Local { dir } => {
                let files = ModelFiles {
                    config: dir.join("config.json"),
                    tokenizer: dir.join("tokenizer.json"),
                    weights: dir.join("model.safetensors"),
                };
                for path in [&files.config, &files.tokenizer, &files.weights] {
                    if !path.is_file() {
                        return Err(LlmError::ModelLoad(format!(
                            "missing model file: {}",
                            path.display()
                        )));
                    }
                }
                Ok(files)
            }
            Self::HuggingFace { repo_id } => {
                let api = hf_hub::api::sync::Api::new().map_err(|e| {
                    LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
                })?;
                let repo = api.model(repo_id.clone());
                let get = |name: &str| {
                    repo.get(name).map_err(|e| {
                        LlmError::ModelLoad(format!("failed to download {name} from {repo_id}: {e}"))
                    })
                };
                Ok(ModelFiles {
                    config: get("config.json")?,
                    tokenizer: get("tokenizer.json")?,
                    weights: get("model.safetensors")?,
                })
            }
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { dir } => write!(f, "{}", dir.display()),
            Self::HuggingFace { repo_id } => f.write_str(repo_id),
        }
    }
}

pub(crate) fn read_config(path: &Path) -> Result<String, LlmError> {
    std::fs::read_to_string(path)
        .map_err(|e| LlmError::ModelLoad(format!("failed to read {}: {e}", path.display())))
}

pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer, LlmError> {
    Tokenizer::from_file(path).map_err(|e| {
        LlmError::ModelLoad(format!("failed to load tokenizer from {}: {e}", path.display()))
    })
}

/// Map a device name from configuration to a candle device.
///
/// # Errors
///
/// Returns [`LlmError::ModelLoad`] for unknown names or unavailable accelerators.
pub fn device_from_name(name: &str) -> Result<Device, LlmError> {
    match name {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0)
            .map_err(|e| LlmError::ModelLoad(format!("CUDA device unavailable: {e}"))),
        "metal" => Device::new_metal(0)
            .map_err(|e| LlmError::ModelLoad(format!("Metal device unavailable: {e}"))),
        other => Err(LlmError::ModelLoad(format!("unknown device: {other}"))),
    }
}
