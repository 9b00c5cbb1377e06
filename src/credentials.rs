use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub agent_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no credentials found at {0}")]
    NotFound(String),
    #[error("credential file error: {0}")]
    Io(String),
    #[error("credential file is malformed: {0}")]
    Parse(String),
}

/// Single credential record kept in the user's config directory.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_default_path() -> Option<Self> {
        default_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Credential, CredentialError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound(self.path.display().to_string()));
            }
            Err(err) => return Err(CredentialError::Io(err.to_string())),
        };
        let credential: Credential =
            serde_json::from_str(&data).map_err(|err| CredentialError::Parse(err.to_string()))?;
        if credential.api_key.trim().is_empty() {
            return Err(CredentialError::NotFound(self.path.display().to_string()));
        }
        Ok(credential)
    }

    pub fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| CredentialError::Io(err.to_string()))?;
        }
        let data = serde_json::to_string_pretty(credential)
            .map_err(|err| CredentialError::Parse(err.to_string()))?;
        fs::write(&self.path, data).map_err(|err| CredentialError::Io(err.to_string()))
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("moltbook").join("credentials.json"))
}
