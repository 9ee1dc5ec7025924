/// A set or remove performed on the page's persistent storage, raised on
/// the same page that performed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// A change made to shared storage by another page of the same origin.
///
/// The writing page never receives its own events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// `None` for a clear of the whole storage.
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// URL of the page that made the change.
    pub url: String,
}

impl StorageEvent {
    pub(crate) fn cleared(url: &str) -> Self {
        Self {
            key: None,
            old_value: None,
            new_value: None,
            url: url.to_string(),
        }
    }
}

/// Common view over both notification kinds.
pub trait StorageChange {
    /// Key that changed, if any.
    fn key(&self) -> Option<&str>;

    /// Value after the change; `None` for removals.
    fn new_value(&self) -> Option<&str>;

    /// Key that changed, treating the empty string as no key.
    fn changed_key(&self) -> Option<&str> {
        self.key().filter(|key| !key.is_empty())
    }
}

impl StorageChange for ChangeNotification {
    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }
}

impl StorageChange for StorageEvent {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_keys_are_not_changes() {
        let cleared = StorageEvent::cleared("app://one");
        assert_eq!(cleared.changed_key(), None);

        let blank = ChangeNotification {
            key: String::new(),
            old_value: None,
            new_value: Some("v".to_string()),
        };
        assert_eq!(blank.changed_key(), None);
        assert_eq!(blank.new_value(), Some("v"));
    }
}
