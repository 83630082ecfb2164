use std::io::ErrorKind;
use std::path::PathBuf;

pub trait ConfigContentProvider {
    /// `Ok(None)` means there is no config source and defaults apply.
    fn get_config_content(&self) -> Result<Option<String>, String>;
}

pub struct FileContentConfigProvider {
    file_path: PathBuf,
}

impl FileContentConfigProvider {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self { file_path: file_path.into() }
    }
}

impl ConfigContentProvider for FileContentConfigProvider {
    fn get_config_content(&self) -> Result<Option<String>, String> {
        match std::fs::read_to_string(&self.file_path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(format!(
                "Failed to read config file {}: {}",
                self.file_path.display(),
                err
            )),
        }
    }
}

pub struct InlineConfigProvider {
    content: Option<String>,
}

impl InlineConfigProvider {
    pub fn new(content: Option<String>) -> Self {
        Self { content }
    }
}

impl ConfigContentProvider for InlineConfigProvider {
    fn get_config_content(&self) -> Result<Option<String>, String> {
        Ok(self.content.clone())
    }
}
