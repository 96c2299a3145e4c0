//! Contact records

use serde::{Deserialize, Serialize};

use super::address::Address;

/// A collaborator, keyed by canonical wallet address.
///
/// `ens_name` is set when the contact was added via alias resolution and
/// preserves the name the user typed. `label` is a free-form display name,
/// typically taken from an invite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ens_name: Option<String>,
}

impl Contact {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            label: None,
            ens_name: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_ens_name(mut self, name: impl Into<String>) -> Self {
        self.ens_name = Some(name.into());
        self
    }

    /// Name to show in a contact list: label, then alias, then the address.
    pub fn display_name(&self) -> &str {
        self.label
            .as_deref()
            .or(self.ens_name.as_deref())
            .unwrap_or_else(|| self.address.as_str())
    }
}
