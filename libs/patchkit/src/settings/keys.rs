use crate::contracts::{ModuleDescriptor, UiKind};

/// Derives persisted key names from module names.
///
/// Layout: `<prefix>_<module>`, `<prefix>_<module>_Selection`,
/// `<prefix>_<module>_Option_<index>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsKeys {
    prefix: String,
}

impl Default for SettingsKeys {
    fn default() -> Self {
        Self::new("Patchkit")
    }
}

impl SettingsKeys {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn enabled(&self, module: &str) -> String {
        format!("{}_{module}", self.prefix)
    }

    #[must_use]
    pub fn selection(&self, module: &str) -> String {
        format!("{}_{module}_Selection", self.prefix)
    }

    #[must_use]
    pub fn option(&self, module: &str, index: usize) -> String {
        format!("{}_{module}_Option_{index}", self.prefix)
    }

    /// The global kill-switch.
    #[must_use]
    pub fn global_enabled(&self) -> String {
        format!("{}_GlobalEnabled", self.prefix)
    }

    /// Every key `descriptor` may persist.
    #[must_use]
    pub fn enumerate_all_keys(&self, descriptor: &ModuleDescriptor) -> Vec<String> {
        let name = descriptor.name.as_str();
        let mut keys = vec![self.enabled(name)];
        match descriptor.ui {
            UiKind::Binary => {}
            UiKind::SingleChoice => keys.push(self.selection(name)),
            UiKind::MultiChoice => {
                keys.extend((0..descriptor.options.len()).map(|i| self.option(name, i)));
            }
        }
        keys
    }
}
