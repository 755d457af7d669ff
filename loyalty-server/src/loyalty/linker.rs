//! Identity Linker
//!
//! Attaches `(property, guest account)` pairs to a group-scoped membership.
//! Which membership a linked account resolves to is decided by the Ledger
//! Store; this module only maintains the set.

use std::collections::BTreeSet;

use shared::models::{LinkedAccount, Membership};
use shared::util::normalize_email;

use super::error::{LedgerError, LedgerResult};

/// Account to attach
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct LinkRequest {
    pub property_id: String,
    pub guest_account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl LinkRequest {
    pub fn new(property_id: impl Into<String>, guest_account_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            guest_account_id: guest_account_id.into(),
            display_name: None,
            email: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Link an account. Returns `false` if the pair was already linked.
pub fn link_account(
    membership: &mut Membership,
    request: &LinkRequest,
    now: i64,
) -> LedgerResult<bool> {
    if !membership.is_group_scoped() {
        return Err(LedgerError::NotGroupScoped(format!(
            "{}@{}",
            membership.guest_id, membership.property_id
        )));
    }
    Ok(membership.linked_accounts.insert(LinkedAccount {
        property_id: request.property_id.clone(),
        guest_account_id: request.guest_account_id.clone(),
        display_name: request.display_name.clone(),
        email: request.email.as_deref().map(normalize_email),
        linked_at: now,
    }))
}

pub fn is_linked(membership: &Membership, property_id: &str, guest_account_id: &str) -> bool {
    membership
        .linked_accounts
        .contains(property_id, guest_account_id)
}

/// Properties that have at least one linked account
pub fn linked_properties(membership: &Membership) -> BTreeSet<String> {
    membership
        .linked_accounts
        .iter()
        .map(|account| account.property_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped() -> Membership {
        let mut m = Membership::new("guest-1", "prop-1", 0);
        m.group_id = Some("group-1".into());
        m.guest_email = Some("ana@example.com".into());
        m
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut m = grouped();
        let request = LinkRequest::new("prop-2", "acct-9")
            .with_display_name("Ana")
            .with_email("Ana@Example.com ");

        assert!(link_account(&mut m, &request, 10).unwrap());
        assert!(!link_account(&mut m, &request, 20).unwrap());
        assert_eq!(m.linked_accounts.len(), 1);

        let account = m.linked_accounts.iter().next().unwrap();
        assert_eq!(account.linked_at, 10);
        assert_eq!(account.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_is_linked_and_properties() {
        let mut m = grouped();
        link_account(&mut m, &LinkRequest::new("prop-2", "acct-1"), 0).unwrap();
        link_account(&mut m, &LinkRequest::new("prop-2", "acct-2"), 0).unwrap();
        link_account(&mut m, &LinkRequest::new("prop-3", "acct-3"), 0).unwrap();

        assert!(is_linked(&m, "prop-2", "acct-2"));
        assert!(!is_linked(&m, "prop-3", "acct-1"));
        assert_eq!(
            linked_properties(&m).into_iter().collect::<Vec<_>>(),
            vec!["prop-2".to_string(), "prop-3".to_string()]
        );
    }

    #[test]
    fn test_ungrouped_membership_rejects_links() {
        let mut m = Membership::new("guest-1", "prop-1", 0);
        let err = link_account(&mut m, &LinkRequest::new("prop-2", "acct-1"), 0).unwrap_err();
        assert!(matches!(err, LedgerError::NotGroupScoped(_)));
        assert!(m.linked_accounts.is_empty());
    }
}
