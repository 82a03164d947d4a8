//! The seam between the oauth flow and the host application's account
//! policy. The flow never decides whether an identity maps to an account,
//! creates one, or links one; it asks the registered responders.

use async_trait::async_trait;

use super::SocialIdentity;
use crate::accounts::User;

/// What a responder decided about a normalized identity.
#[derive(Debug)]
pub enum AuthDecision {
    /// This responder does not handle the identity; ask the next one.
    Unhandled,

    /// The identity resolved to a user; bind it to the session.
    Authenticated(User),

    /// The provider identity is already linked to another account.
    Duplicate,

    /// The email belongs to an existing account.
    DuplicateEmail(String),

    /// A new account can be created once the user explicitly confirms.
    SignupConfirm,

    /// Responder-specific failure.
    Error(String),
}

/// Host-supplied account policy. Account linking may need user interaction
/// (see [`AuthResponder::confirm`]) or context only the host has, which is
/// why this is a trait and not a function of the flow.
#[async_trait]
pub trait AuthResponder: Send + Sync {
    /// Decide what to do with an identity arriving from the provider.
    async fn respond(&self, identity: &SocialIdentity) -> AuthDecision;

    /// Called when the user confirms a pending signup.
    async fn confirm(&self, _identity: &SocialIdentity) -> AuthDecision {
        AuthDecision::Unhandled
    }
}

/// Responders in registration order; the first decision other than
/// [`AuthDecision::Unhandled`] wins.
#[derive(Default)]
pub struct Responders {
    responders: Vec<Box<dyn AuthResponder>>,
}

impl Responders {
    pub fn push(&mut self, responder: Box<dyn AuthResponder>) {
        self.responders.push(responder);
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }

    pub async fn dispatch(&self, identity: &SocialIdentity) -> AuthDecision {
        for responder in &self.responders {
            match responder.respond(identity).await {
                AuthDecision::Unhandled => continue,
                decision => return decision,
            }
        }
        AuthDecision::Unhandled
    }

    pub async fn dispatch_confirm(&self, identity: &SocialIdentity) -> AuthDecision {
        for responder in &self.responders {
            match responder.confirm(identity).await {
                AuthDecision::Unhandled => continue,
                decision => return decision,
            }
        }
        AuthDecision::Unhandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Declines;

    #[async_trait]
    impl AuthResponder for Declines {
        async fn respond(&self, _identity: &SocialIdentity) -> AuthDecision {
            AuthDecision::Unhandled
        }
    }

    struct Accepts;

    #[async_trait]
    impl AuthResponder for Accepts {
        async fn respond(&self, _identity: &SocialIdentity) -> AuthDecision {
            AuthDecision::Authenticated(User {
                id: 7,
                name: "Jane Doe".to_string(),
                is_admin: false,
                is_anonymous: false,
            })
        }
    }

    fn identity() -> SocialIdentity {
        SocialIdentity {
            provider: "linkedin".to_string(),
            uid: "U1".to_string(),
            access_token: "T".to_string(),
            expires_in: 3600,
            title: "Jane Doe".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            headline: None,
            email: "piet@example.com".to_string(),
            is_connect: false,
        }
    }

    #[actix_rt::test]
    async fn the_first_answer_wins() {
        let mut responders = Responders::default();
        responders.push(Box::new(Declines));
        responders.push(Box::new(Accepts));

        match responders.dispatch(&identity()).await {
            AuthDecision::Authenticated(user) => assert_eq!(user.id, 7),
            other => panic!("expected Authenticated, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn no_answer_is_unhandled() {
        let mut responders = Responders::default();
        responders.push(Box::new(Declines));

        assert!(matches!(
            responders.dispatch(&identity()).await,
            AuthDecision::Unhandled
        ));
    }

    #[actix_rt::test]
    async fn confirm_defaults_to_unhandled() {
        let mut responders = Responders::default();
        responders.push(Box::new(Accepts));

        assert!(matches!(
            responders.dispatch_confirm(&identity()).await,
            AuthDecision::Unhandled
        ));
    }
}
