use crate::contracts::{ModuleDescriptor, UiKind};

use super::{SettingsError, SettingsKeys, SettingsStore};

/// Selected option(s) of a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Choice {
    None,
    Single(usize),
    /// One flag per option; length always equals the option count.
    Multi(Vec<bool>),
}

/// Configuration snapshot of one module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub choice: Choice,
}

impl ModuleConfig {
    #[must_use]
    pub fn defaults(descriptor: &ModuleDescriptor) -> Self {
        let choice = match descriptor.ui {
            UiKind::Binary => Choice::None,
            UiKind::SingleChoice => Choice::Single(descriptor.default_choice),
            UiKind::MultiChoice => Choice::Multi(
                (0..descriptor.options.len())
                    .map(|i| default_bit(descriptor, i))
                    .collect(),
            ),
        };
        Self {
            enabled: descriptor.default_enabled,
            choice,
        }
    }

    /// Reads the persisted snapshot, falling back to descriptor defaults for
    /// anything missing or out of range.
    #[must_use]
    pub fn load(
        store: &dyn SettingsStore,
        keys: &SettingsKeys,
        descriptor: &ModuleDescriptor,
    ) -> Self {
        let name = descriptor.name.as_str();
        let enabled = store.get_bool(&keys.enabled(name), descriptor.default_enabled);

        let choice = match descriptor.ui {
            UiKind::Binary => Choice::None,
            UiKind::SingleChoice => {
                let default = descriptor.default_choice;
                let raw = store.get_int(&keys.selection(name), to_i64(default));
                let index = usize::try_from(raw)
                    .ok()
                    .filter(|i| *i < descriptor.options.len())
                    .unwrap_or_else(|| {
                        tracing::debug!(module = name, raw, "Persisted selection out of range");
                        default
                    });
                Choice::Single(index)
            }
            UiKind::MultiChoice => Choice::Multi(
                (0..descriptor.options.len())
                    .map(|i| store.get_bool(&keys.option(name, i), default_bit(descriptor, i)))
                    .collect(),
            ),
        };

        Self { enabled, choice }
    }

    /// Writes the whole snapshot.
    ///
    /// # Errors
    /// Returns the first [`SettingsError`] from the store.
    pub fn persist(
        &self,
        store: &dyn SettingsStore,
        keys: &SettingsKeys,
        descriptor: &ModuleDescriptor,
    ) -> Result<(), SettingsError> {
        let name = descriptor.name.as_str();
        store.set_bool(&keys.enabled(name), self.enabled)?;
        self.persist_choice(store, keys, descriptor)
    }

    /// Writes only the selection part.
    ///
    /// # Errors
    /// Returns the first [`SettingsError`] from the store.
    pub fn persist_choice(
        &self,
        store: &dyn SettingsStore,
        keys: &SettingsKeys,
        descriptor: &ModuleDescriptor,
    ) -> Result<(), SettingsError> {
        let name = descriptor.name.as_str();
        match &self.choice {
            Choice::None => Ok(()),
            Choice::Single(i) => store.set_int(&keys.selection(name), to_i64(*i)),
            Choice::Multi(bits) => bits
                .iter()
                .enumerate()
                .try_for_each(|(i, on)| store.set_bool(&keys.option(name, i), *on)),
        }
    }

    #[must_use]
    pub fn selected_option(&self) -> Option<usize> {
        match self.choice {
            Choice::Single(i) => Some(i),
            _ => None,
        }
    }

    #[must_use]
    pub fn selection(&self) -> Option<&[bool]> {
        match &self.choice {
            Choice::Multi(bits) => Some(bits),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_selected(&self, index: usize) -> bool {
        match &self.choice {
            Choice::None => false,
            Choice::Single(i) => *i == index,
            Choice::Multi(bits) => bits.get(index).copied().unwrap_or(false),
        }
    }
}

fn default_bit(descriptor: &ModuleDescriptor, index: usize) -> bool {
    descriptor.default_selection.get(index).copied().unwrap_or(false)
}

fn to_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::contracts::InterceptKinds;
    use crate::settings::MemoryStore;

    fn single() -> ModuleDescriptor {
        ModuleDescriptor::binary("Tint", "Hierarchy", InterceptKinds::AFTER)
            .single_choice(["Off", "Soft", "Strong"], 1)
    }

    #[test]
    fn missing_keys_load_defaults() {
        let store = MemoryStore::new();
        let cfg = ModuleConfig::load(&store, &SettingsKeys::default(), &single());
        assert_eq!(cfg, ModuleConfig::defaults(&single()));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let store = MemoryStore::new();
        let keys = SettingsKeys::default();
        store.set_int(&keys.selection("Tint"), 9).unwrap();
        let cfg = ModuleConfig::load(&store, &keys, &single());
        assert_eq!(cfg.selected_option(), Some(1));

        store.set_int(&keys.selection("Tint"), -3).unwrap();
        let cfg = ModuleConfig::load(&store, &keys, &single());
        assert_eq!(cfg.selected_option(), Some(1));
    }

    #[test]
    fn multi_choice_reads_only_declared_options() {
        let store = MemoryStore::new();
        let keys = SettingsKeys::default();
        let d = ModuleDescriptor::binary("Tags", "Inspector", InterceptKinds::BEFORE)
            .multi_choice(["a", "b"], &[false, true]);
        store.set_bool(&keys.option("Tags", 0), true).unwrap();
        store.set_bool(&keys.option("Tags", 5), true).unwrap();
        let cfg = ModuleConfig::load(&store, &keys, &d);
        assert_eq!(cfg.selection(), Some(&[true, true][..]));
    }

    #[test]
    fn selection_length_follows_options_not_defaults() {
        let store = MemoryStore::new();
        let keys = SettingsKeys::default();
        let mut d = ModuleDescriptor::binary("Bare", "Inspector", InterceptKinds::BEFORE);
        d.ui = UiKind::MultiChoice;
        d.options = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];

        assert_eq!(ModuleConfig::defaults(&d).selection(), Some(&[false, false, false][..]));

        store.set_bool(&keys.option("Bare", 2), true).unwrap();
        let cfg = ModuleConfig::load(&store, &keys, &d);
        assert_eq!(cfg.selection(), Some(&[false, false, true][..]));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let store = MemoryStore::new();
        let keys = SettingsKeys::default();
        let d = single();
        let cfg = ModuleConfig {
            enabled: true,
            choice: Choice::Single(2),
        };
        cfg.persist(&store, &keys, &d).unwrap();
        assert_eq!(ModuleConfig::load(&store, &keys, &d), cfg);
    }
}
