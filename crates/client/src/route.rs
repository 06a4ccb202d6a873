//! Addressing of remote collections.

use std::fmt;

use xsoar_core::ObjectKind;

/// Which remote collection a call targets.
///
/// Integration instances can live inside a tenant account; every other kind
/// is addressed on the main host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    kind: ObjectKind,
    account: Option<String>,
}

impl Route {
    /// Route on the main host.
    pub const fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            account: None,
        }
    }

    /// Scope this route to a tenant account (by display name).
    #[must_use]
    pub fn in_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Scope to an account when one is given and non-empty.
    #[must_use]
    pub fn scoped(self, account: Option<&str>) -> Self {
        match account {
            Some(name) if !name.is_empty() => self.in_account(name),
            _ => self,
        }
    }

    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Remote key of the scoping account (`acc_<name>`).
    pub fn account_key(&self) -> Option<String> {
        self.account.as_deref().map(account_key)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => write!(f, "{} in {}", self.kind, account_key(account)),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Remote lookup key of an account: `acc_` followed by its display name.
pub fn account_key(name: &str) -> String {
    format!("acc_{name}")
}
