// Implements an in-memory account directory and the auth-responder policy
// for identities arriving from a provider. Persistent storage is somebody
// else's job; this is the decision logic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis::accounts::User;
use trellis::oauth::{AuthDecision, AuthResponder, SocialIdentity};

/// A user account with at most one linked identity per provider.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

/// A provider identity linked to an account. The provider's bearer token
/// travels here and nowhere else.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Identity {
    pub account_id: i32,
    pub provider: String,
    pub uid: String,
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Default)]
struct DirectoryState {
    next_id: i32,
    accounts: HashMap<i32, Account>,
    identities: Vec<Identity>,
}

impl DirectoryState {
    fn linked_account_id(&self, provider: &str, uid: &str) -> Option<i32> {
        self.identities
            .iter()
            .find(|identity| identity.provider == provider && identity.uid == uid)
            .map(|identity| identity.account_id)
    }

    fn email_taken(&self, email: &str) -> bool {
        self.accounts.values().any(|account| account.email == email)
    }
}

/// Thread-safe account directory. Cloning shares the same directory, so the
/// application and its tests can hold a handle to the responder they
/// registered.
#[derive(Clone, Default)]
pub struct AccountDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        AccountDirectory::default()
    }

    pub fn insert_account(&self, name: &str, email: &str) -> i32 {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.next_id += 1;
        let id = state.next_id;
        state.accounts.insert(
            id,
            Account {
                id,
                name: name.to_string(),
                email: email.to_string(),
                is_admin: false,
                last_login: None,
                created: Utc::now(),
            },
        );
        id
    }

    pub fn link_identity(&self, account_id: i32, provider: &str, uid: &str) {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.identities.push(Identity {
            account_id,
            provider: provider.to_string(),
            uid: uid.to_string(),
            access_token: String::new(),
            expires_in: 0,
        });
    }

    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        let state = self.state.read().expect("directory lock poisoned");
        state
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned()
    }

    pub fn identity_for(&self, provider: &str, uid: &str) -> Option<Identity> {
        let state = self.state.read().expect("directory lock poisoned");
        state
            .identities
            .iter()
            .find(|identity| identity.provider == provider && identity.uid == uid)
            .cloned()
    }
}

fn session_user(account: &Account) -> User {
    User {
        id: account.id,
        name: account.name.clone(),
        is_admin: account.is_admin,
        is_anonymous: false,
    }
}

/// The classic four-state policy: whether the identity is already linked,
/// crossed with whether the flow was started as a connect.
#[async_trait]
impl AuthResponder for AccountDirectory {
    async fn respond(&self, identity: &SocialIdentity) -> AuthDecision {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => return AuthDecision::Error("account directory lock poisoned".to_string()),
        };

        match state.linked_account_id(&identity.provider, &identity.uid) {
            // One linked identity per provider; connecting again is a
            // duplicate no matter which account it points at.
            Some(_) if identity.is_connect => AuthDecision::Duplicate,
            Some(account_id) => match state.accounts.get_mut(&account_id) {
                Some(account) => {
                    account.last_login = Some(Utc::now());
                    AuthDecision::Authenticated(session_user(account))
                }
                None => AuthDecision::Error("identity linked to a missing account".to_string()),
            },
            None if identity.is_connect => {
                AuthDecision::Error("no signed-in account to connect".to_string())
            }
            None => {
                if state.email_taken(&identity.email) {
                    AuthDecision::DuplicateEmail(identity.email.clone())
                } else {
                    AuthDecision::SignupConfirm
                }
            }
        }
    }

    async fn confirm(&self, identity: &SocialIdentity) -> AuthDecision {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => return AuthDecision::Error("account directory lock poisoned".to_string()),
        };

        // Re-check: the directory may have changed between the confirmation
        // page and this submit.
        if state
            .linked_account_id(&identity.provider, &identity.uid)
            .is_some()
        {
            return AuthDecision::Duplicate;
        }
        if state.email_taken(&identity.email) {
            return AuthDecision::DuplicateEmail(identity.email.clone());
        }

        state.next_id += 1;
        let id = state.next_id;
        let account = Account {
            id,
            name: identity.title.clone(),
            email: identity.email.clone(),
            is_admin: false,
            last_login: Some(Utc::now()),
            created: Utc::now(),
        };
        state.identities.push(Identity {
            account_id: id,
            provider: identity.provider.clone(),
            uid: identity.uid.clone(),
            access_token: identity.access_token.clone(),
            expires_in: identity.expires_in,
        });
        let user = session_user(&account);
        state.accounts.insert(id, account);

        AuthDecision::Authenticated(user)
    }
}
