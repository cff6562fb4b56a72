//! Named string parameters read at loop startup.

use std::collections::HashMap;

/// Lookup of persisted settings by parameter name.
///
/// Values are the raw strings as stored; parsing and defaults belong to
/// the consumer.
pub trait SettingsStore {
    fn find(&self, name: &str) -> Option<&str>;
}

impl SettingsStore for HashMap<String, String> {
    fn find(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn find(&self, name: &str) -> Option<&str> {
        (**self).find(name)
    }
}
