//! Identifier resolution.
//!
//! Settings name the quest and item symbolically. The resolver turns those
//! keys into host handles the first time a lookup succeeds and caches them
//! until the next session reset. Failed lookups are logged and retried on the
//! next call without backoff; the host may still be finishing its own load.

use std::num::ParseIntError;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::config::Settings;
use crate::host::{FormId, Inspector};
use crate::journal::{Channel, Journal};

/// Prefix standing in for the owning plugin's load-order byte.
pub const LOAD_ORDER_PLACEHOLDER: &str = "XX";

/// Parses a hexadecimal item key such as `625C7C` or `XX625C7C`.
pub fn parse_item_key(key: &str) -> Result<u32, ParseIntError> {
    let trimmed = key.trim();
    let hex = trimmed.strip_prefix(LOAD_ORDER_PLACEHOLDER).unwrap_or(trimmed);
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    u32::from_str_radix(hex, 16)
}

/// Handles resolved so far in the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentifiers {
    pub quest: Option<FormId>,
    pub item: Option<FormId>,
}

impl ResolvedIdentifiers {
    #[must_use]
    pub const fn quest_resolved(&self) -> bool {
        self.quest.is_some()
    }

    #[must_use]
    pub const fn item_resolved(&self) -> bool {
        self.item.is_some()
    }
}

/// Caches identifier lookups for one session.
#[derive(Debug, Default)]
pub struct IdentifierResolver {
    cache: Mutex<ResolvedIdentifiers>,
}

impl IdentifierResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cache(&self) -> MutexGuard<'_, ResolvedIdentifiers> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts every enabled, unresolved lookup once and returns the cache.
    pub fn resolve(&self, settings: &Settings, inspector: &dyn Inspector, journal: &Journal) -> ResolvedIdentifiers {
        let mut cache = self.cache();

        if settings.item.enabled && cache.item.is_none() {
            let item = &settings.item;
            match parse_item_key(&item.item_key) {
                Ok(local_id) => match inspector.find_item(&item.item_plugin_key, local_id) {
                    Some(handle) => {
                        cache.item = Some(handle);
                        journal.info(
                            Channel::Actions,
                            format!("Item ({}) resolved successfully - FormID: {handle}", item.item_name),
                        );
                    }
                    None => journal.warn(
                        Channel::Actions,
                        format!("Item ({}) FormID resolution failed", item.item_name),
                    ),
                },
                Err(err) => journal.warn(
                    Channel::Actions,
                    format!("Item ({}) has an invalid key {:?}: {err}", item.item_name, item.item_key),
                ),
            }
        }

        if settings.quest.enabled && cache.quest.is_none() {
            let key = &settings.quest.tracked_key;
            match inspector.find_progress_entity(key) {
                Some(handle) => {
                    cache.quest = Some(handle);
                    journal.info(
                        Channel::Quest,
                        format!("Quest ({key}) resolved successfully - FormID: {handle}"),
                    );
                }
                None => journal.warn(Channel::Quest, format!("Quest ({key}) not found")),
            }
        }

        *cache
    }

    /// Current cache contents without attempting lookups.
    #[must_use]
    pub fn snapshot(&self) -> ResolvedIdentifiers {
        *self.cache()
    }

    /// Forgets every handle; the next `resolve` looks everything up again.
    pub fn reset(&self) {
        *self.cache() = ResolvedIdentifiers::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    fn host_with_content() -> (InMemoryHost, FormId, FormId) {
        let host = InMemoryHost::new();
        let quest = host.add_quest("YW_Quest_MDF", "YurianaWench.esp");
        let item = host.add_item("YurianaWench.esp", 0x625C7C);
        (host, quest, item)
    }

    #[test]
    fn test_parse_item_key_variants() {
        assert_eq!(parse_item_key("625C7C"), Ok(0x625C7C));
        assert_eq!(parse_item_key("XX625C7C"), Ok(0x625C7C));
        assert_eq!(parse_item_key(" 0x0012ab "), Ok(0x12AB));
        assert!(parse_item_key("XXnothex").is_err());
        assert!(parse_item_key("").is_err());
    }

    #[test]
    fn test_resolve_caches_success() {
        let (host, quest, item) = host_with_content();
        let resolver = IdentifierResolver::new();
        let journal = Journal::in_memory();
        let settings = Settings::default();

        let resolved = resolver.resolve(&settings, &host, &journal);
        assert_eq!(resolved.quest, Some(quest));
        assert_eq!(resolved.item, Some(item));

        // A cached handle survives the entity disappearing.
        host.remove_quest("YW_Quest_MDF");
        let again = resolver.resolve(&settings, &host, &journal);
        assert_eq!(again.quest, Some(quest));
        assert!(journal.contains(Channel::Quest, "resolved successfully"));
    }

    #[test]
    fn test_resolve_retries_until_success() {
        let host = InMemoryHost::new();
        let resolver = IdentifierResolver::new();
        let journal = Journal::in_memory();
        let settings = Settings::default();

        let first = resolver.resolve(&settings, &host, &journal);
        assert!(!first.quest_resolved());
        assert!(!first.item_resolved());
        assert!(journal.contains(Channel::Quest, "[warn]"));

        let quest = host.add_quest("YW_Quest_MDF", "YurianaWench.esp");
        let second = resolver.resolve(&settings, &host, &journal);
        assert_eq!(second.quest, Some(quest));
        assert!(!second.item_resolved());
    }

    #[test]
    fn test_disabled_features_are_not_resolved() {
        let (host, _, _) = host_with_content();
        let resolver = IdentifierResolver::new();
        let journal = Journal::in_memory();
        let mut settings = Settings::default();
        settings.item.enabled = false;

        let resolved = resolver.resolve(&settings, &host, &journal);
        assert!(resolved.quest_resolved());
        assert!(!resolved.item_resolved());
        assert!(journal.lines(Channel::Actions).is_empty());
    }

    #[test]
    fn test_invalid_item_key_is_a_warning() {
        let (host, _, _) = host_with_content();
        let resolver = IdentifierResolver::new();
        let journal = Journal::in_memory();
        let mut settings = Settings::default();
        settings.item.item_key = "XXZZZ".to_string();

        let resolved = resolver.resolve(&settings, &host, &journal);
        assert!(!resolved.item_resolved());
        assert!(journal.contains(Channel::Actions, "invalid key"));
    }

    #[test]
    fn test_reset_clears_cache() {
        let (host, _, _) = host_with_content();
        let resolver = IdentifierResolver::new();
        let journal = Journal::in_memory();
        resolver.resolve(&Settings::default(), &host, &journal);
        assert!(resolver.snapshot().quest_resolved());

        resolver.reset();
        assert_eq!(resolver.snapshot(), ResolvedIdentifiers::default());
    }
}
