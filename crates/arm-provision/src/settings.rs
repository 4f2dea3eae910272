use std::path::PathBuf;

use provision_core::Settings;

use crate::error::Result;

/// Settings sources given on the command line.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) config: Option<PathBuf>,
    pub(crate) subscription_id: Option<String>,
    pub(crate) location: Option<String>,
}

impl Overrides {
    /// Config file, then environment, then flags.
    pub(crate) fn resolve(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        settings.apply_process_env();
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(id) = self.subscription_id.as_deref().filter(|s| !s.trim().is_empty()) {
            settings.subscription_id = Some(id.to_string());
        }
        if let Some(location) = self.location.as_deref().filter(|s| !s.trim().is_empty()) {
            settings.location = location.to_string();
        }
    }
}
