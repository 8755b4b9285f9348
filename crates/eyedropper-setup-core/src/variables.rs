//! Typed accessors over the engine's bundle variables.

use crate::engine::VariableStore;

/// Bundle variable names defined by the setup manifest.
pub mod bundle_var {
    pub const INSTALL_DIRECTORY: &str = "InstallFolder";
    /// Directory bundle payloads are copied to for a layout run.
    pub const LAYOUT_DIRECTORY: &str = "WixBundleLayoutDirectory";
    pub const VERSION: &str = "WixBundleVersion";
    pub const NAME: &str = "WixBundleName";
    pub const CREATE_DESKTOP_SHORTCUT: &str = "CreateDesktopShortcut";
    pub const CREATE_START_MENU_SHORTCUT: &str = "CreateStartMenuShortcut";
    pub const LAUNCH_ON_STARTUP: &str = "LaunchOnStartup";
    pub const LOG: &str = "WixBundleLog";
    pub const LICENSE: &str = "License";
}

/// Value types that know how to travel through a [`VariableStore`].
pub trait VariableValue: Clone + PartialEq {
    fn read(store: &dyn VariableStore, name: &str) -> Self;
    fn write(&self, store: &dyn VariableStore, name: &str);
}

impl VariableValue for bool {
    fn read(store: &dyn VariableStore, name: &str) -> Self {
        // Booleans are stored numerically: 1 is true, anything else false.
        store.get_numeric(name) == Some(1)
    }

    fn write(&self, store: &dyn VariableStore, name: &str) {
        store.set_numeric(name, i64::from(*self));
    }
}

impl VariableValue for String {
    fn read(store: &dyn VariableStore, name: &str) -> Self {
        store.get_string(name).unwrap_or_default()
    }

    fn write(&self, store: &dyn VariableStore, name: &str) {
        store.set_string(name, self, false);
    }
}

/// Lazily fetched, write-through cache of one engine variable.
#[derive(Debug, Clone)]
pub struct BundleVariable<T> {
    name: &'static str,
    cached: Option<T>,
}

impl<T: VariableValue> BundleVariable<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, cached: None }
    }

    /// Returns the cached value, fetching it from the store on first use.
    pub fn get(&mut self, store: &dyn VariableStore) -> T {
        let name = self.name;
        self.cached
            .get_or_insert_with(|| T::read(store, name))
            .clone()
    }

    /// Writes `value` through to the store unless it matches the current value.
    ///
    /// Returns whether a write happened.
    pub fn set(&mut self, store: &dyn VariableStore, value: T) -> bool {
        if self.get(store) == value {
            return false;
        }
        value.write(store, self.name);
        self.cached = Some(value);
        true
    }
}

/// The variable slots the bootstrapper reads or writes during a run.
#[derive(Debug, Clone)]
pub struct BundleVariables {
    pub install_directory: BundleVariable<String>,
    pub layout_directory: BundleVariable<String>,
    pub create_desktop_shortcut: BundleVariable<bool>,
    pub create_start_menu_shortcut: BundleVariable<bool>,
    pub launch_on_startup: BundleVariable<bool>,
    pub version: BundleVariable<String>,
    pub log_file: BundleVariable<String>,
    pub bundle_name: BundleVariable<String>,
    pub license: BundleVariable<String>,
}

impl Default for BundleVariables {
    fn default() -> Self {
        Self {
            install_directory: BundleVariable::new(bundle_var::INSTALL_DIRECTORY),
            layout_directory: BundleVariable::new(bundle_var::LAYOUT_DIRECTORY),
            create_desktop_shortcut: BundleVariable::new(bundle_var::CREATE_DESKTOP_SHORTCUT),
            create_start_menu_shortcut: BundleVariable::new(
                bundle_var::CREATE_START_MENU_SHORTCUT,
            ),
            launch_on_startup: BundleVariable::new(bundle_var::LAUNCH_ON_STARTUP),
            version: BundleVariable::new(bundle_var::VERSION),
            log_file: BundleVariable::new(bundle_var::LOG),
            bundle_name: BundleVariable::new(bundle_var::NAME),
            license: BundleVariable::new(bundle_var::LICENSE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn get_reads_store_once() {
        let store = MemoryStore::default();
        store.seed_string(bundle_var::NAME, "EyeDropper");
        let mut name = BundleVariable::<String>::new(bundle_var::NAME);

        assert_eq!(name.get(&store), "EyeDropper");
        store.seed_string(bundle_var::NAME, "Changed behind our back");
        assert_eq!(name.get(&store), "EyeDropper");
        assert_eq!(store.reads(bundle_var::NAME), 1);
    }

    #[test]
    fn set_with_same_value_skips_write() {
        let store = MemoryStore::default();
        store.seed_numeric(bundle_var::CREATE_DESKTOP_SHORTCUT, 1);
        let mut flag = BundleVariable::<bool>::new(bundle_var::CREATE_DESKTOP_SHORTCUT);

        assert!(!flag.set(&store, true));
        assert_eq!(store.writes(bundle_var::CREATE_DESKTOP_SHORTCUT), 0);
    }

    #[test]
    fn set_with_new_value_writes_through() {
        let store = MemoryStore::default();
        let mut flag = BundleVariable::<bool>::new(bundle_var::LAUNCH_ON_STARTUP);

        assert!(flag.set(&store, true));
        assert_eq!(store.writes(bundle_var::LAUNCH_ON_STARTUP), 1);
        assert_eq!(store.numeric(bundle_var::LAUNCH_ON_STARTUP), Some(1));
        assert!(flag.get(&store));

        assert!(!flag.set(&store, true));
        assert_eq!(store.writes(bundle_var::LAUNCH_ON_STARTUP), 1);
    }

    #[test]
    fn string_writes_are_unformatted() {
        let store = MemoryStore::default();
        let mut dir = BundleVariable::<String>::new(bundle_var::INSTALL_DIRECTORY);

        assert!(dir.set(&store, "C:\\Tools".to_string()));
        assert_eq!(store.string(bundle_var::INSTALL_DIRECTORY).as_deref(), Some("C:\\Tools"));
        assert_eq!(store.formatted_writes(), 0);
    }
}
