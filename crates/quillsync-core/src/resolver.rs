//! Contact resolution
//!
//! Turns whatever the user typed into a canonical `Contact`. Two input
//! shapes are recognized: a wallet address (`0x` + 40 hex digits, any
//! casing) and a name-service alias ending in `.eth`. Addresses pass
//! through without any network traffic; aliases cost exactly one lookup
//! against the injected `AliasResolver`. Anything else is rejected before
//! the resolver is consulted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CollabError, CollabResult};
use crate::types::{Address, Contact};

/// Suffix that marks an input as a name-service alias.
const ALIAS_SUFFIX: &str = ".eth";

/// Name-service lookup capability.
#[async_trait]
pub trait AliasResolver: Send + Sync {
    /// Address registered for an alias. `Ok(None)` means the alias exists
    /// syntactically but nothing is registered under it.
    async fn resolve_alias(&self, name: &str) -> CollabResult<Option<Address>>;
}

/// Alias resolver backed by a fixed table. Lookups are case-insensitive.
#[derive(Default)]
pub struct StaticAliasResolver {
    entries: HashMap<String, Address>,
}

impl StaticAliasResolver {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: impl IntoIterator<Item = (String, Address)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, address)| (name.to_ascii_lowercase(), address))
                .collect(),
        }
    }
}

#[async_trait]
impl AliasResolver for StaticAliasResolver {
    async fn resolve_alias(&self, name: &str) -> CollabResult<Option<Address>> {
        Ok(self.entries.get(&name.to_ascii_lowercase()).cloned())
    }
}

/// Resolves raw contact input to a canonical contact.
pub struct ContactResolver {
    alias: Arc<dyn AliasResolver>,
}

impl ContactResolver {
    pub fn new(alias: Arc<dyn AliasResolver>) -> Self {
        Self { alias }
    }

    /// Resolve user input to a contact.
    ///
    /// Resolution is idempotent: feeding a resolved contact's address back
    /// in yields the same contact. Alias inputs keep the typed name on
    /// `Contact::ens_name`.
    pub async fn resolve(&self, raw: &str) -> CollabResult<Contact> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(CollabError::InvalidContact(
                "contact input is empty".to_string(),
            ));
        }

        if Address::is_valid(value) {
            return Ok(Contact::new(Address::parse(value)?));
        }

        if is_alias(value) {
            debug!(alias = value, "resolving contact alias");
            let resolved = self.alias.resolve_alias(value).await.map_err(|e| {
                CollabError::ResolutionFailed {
                    input: value.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let address = resolved.ok_or_else(|| CollabError::ResolutionFailed {
                input: value.to_string(),
                reason: "no address registered for this name".to_string(),
            })?;
            return Ok(Contact::new(address).with_ens_name(value));
        }

        Err(CollabError::InvalidContact(format!(
            "'{value}' is not a wallet address or .eth name"
        )))
    }
}

fn is_alias(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.ends_with(ALIAS_SUFFIX) && lower.len() > ALIAS_SUFFIX.len()
}
