// SPDX-License-Identifier: MIT

//! The one concrete [`SessionOracle`] this binary ships. Spec §1 scopes the
//! real "session→user" provider out as an external collaborator; this is a
//! static-token stand-in driven by `orchestrator.toml`'s `[[auth.tokens]]`,
//! good enough to run the orchestrator standalone and to exercise every
//! handler in integration tests. A production deployment fronts the daemon
//! with a real auth provider and swaps this for an adapter implementing the
//! same trait.

use ao_http::AuthedUser;
use std::collections::HashMap;

use crate::config::StaticToken;

pub struct ConfigTokenOracle {
    tokens: HashMap<String, AuthedUser>,
}

impl ConfigTokenOracle {
    pub fn new(tokens: &[StaticToken]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| (t.token.clone(), AuthedUser { user_id: ao_core::UserId::from_string(t.user_id.clone()), is_admin: t.is_admin }))
            .collect();
        Self { tokens }
    }
}

#[async_trait::async_trait]
impl ao_http::SessionOracle for ConfigTokenOracle {
    async fn resolve(&self, token: &str) -> Option<AuthedUser> {
        self.tokens.get(token).cloned()
    }
}
