//! Authenticated session against the Drive API.

use crate::auth::AccessToken;
use crate::config::UploaderConfig;
use crate::transport::HttpTransport;
use std::sync::Arc;

mod executor;
pub use executor::RequestExecutor;

/// Authenticated handle for one flow invocation.
///
/// Created by [`crate::auth::Authenticator`] and dropped when the flow ends;
/// nothing in it is shared with other invocations except the transport.
pub struct Session {
    token: AccessToken,
    executor: RequestExecutor,
}

impl Session {
    pub(crate) fn new(
        token: AccessToken,
        config: Arc<UploaderConfig>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let executor = RequestExecutor::new(config, transport, token.clone());
        Self { token, executor }
    }

    /// The bearer token backing this session.
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Executor used by the remote operations.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("scopes", &self.token.scopes)
            .field("expires_at", &self.token.expires_at)
            .finish()
    }
}
