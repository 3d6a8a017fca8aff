use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// On-disk home of the OpenAI API key saved with `--save-key`.
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// `<config dir>/commitsmith/openai.key`, e.g. `~/.config/commitsmith/openai.key` on Linux.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("could not determine the user config directory"))?;
        Ok(Self::at(dir.join("commitsmith").join("openai.key")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        KeyStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the key, readable by the owner only. Returns where it was written.
    pub fn save(&self, key: &str) -> Result<&Path> {
        let key = key.trim();
        if key.is_empty() {
            bail!("no API key to save; pass --openai-key or set $OPENAI_API_KEY");
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            restrict(dir, 0o700)?;
        }

        fs::write(&self.path, key)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        restrict(&self.path, 0o600)?;

        log::debug!("saved API key to {}", self.path.display());
        Ok(self.path())
    }

    /// The saved key, or `None` if nothing was saved.
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let key = raw.trim();
                Ok((!key.is_empty()).then(|| key.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
