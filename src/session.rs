//! Session controller.
//!
//! The session is derived from the stored token pair: a pair means
//! `Authenticated`, no pair means `Anonymous`. Every transition is written
//! through to the token store so a restart picks up where it left off.
use crate::api::{ApiClient, Transport};
use crate::error::{AuthError, PASSWORD_LEN, USERNAME_LEN, ValidationError};
use crate::store::{KeyValueStore, TokenPair, TokenStore};

// ── Credentials ───────────────────────────────────────────────────────────────

/// Username/password that passed the length checks. Only constructible
/// through `new`, so login/register never see out-of-range input.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self, ValidationError> {
        if !within(username, USERNAME_LEN) {
            return Err(ValidationError::Username);
        }
        if !within(password, PASSWORD_LEN) {
            return Err(ValidationError::Password);
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

fn within(s: &str, (min, max): (usize, usize)) -> bool {
    let n = s.chars().count();
    n >= min && n <= max
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(TokenPair),
}

impl From<Option<TokenPair>> for SessionState {
    fn from(pair: Option<TokenPair>) -> Self {
        match pair {
            Some(pair) => SessionState::Authenticated(pair),
            None => SessionState::Anonymous,
        }
    }
}

/// Which auth form is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Login => "login",
            AuthMode::Register => "register",
        }
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct SessionController<S> {
    store: TokenStore<S>,
    state: SessionState,
    mode: AuthMode,
    error: Option<String>,
}

impl<S: KeyValueStore> SessionController<S> {
    /// Initial state is whatever the store holds.
    pub fn new(store: TokenStore<S>) -> Self {
        let state = SessionState::from(store.load());
        Self {
            store,
            state,
            mode: AuthMode::default(),
            error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn access_token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(pair) => Some(pair.access.as_str()),
            SessionState::Anonymous => None,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Last auth failure, until dismissed or the next attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn toggle_mode(&mut self) {
        self.error = None;
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
    }

    pub async fn login<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        self.error = None;
        let result = api
            .login(&credentials.username, &credentials.password)
            .await
            .map_err(AuthError::from)
            .and_then(|resp| {
                resp.into_pair()
                    .ok_or(AuthError::InvalidTokens("Invalid login response tokens"))
            });
        self.settle(credentials, result)
    }

    pub async fn register<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        self.error = None;
        let result = api
            .register(&credentials.username, &credentials.password)
            .await
            .map_err(AuthError::from)
            .and_then(|resp| {
                resp.into_pair()
                    .ok_or(AuthError::InvalidTokens("Invalid register response tokens"))
            });
        self.settle(credentials, result)
    }

    fn settle(
        &mut self,
        credentials: &Credentials,
        result: Result<TokenPair, AuthError>,
    ) -> Result<(), AuthError> {
        match result {
            Ok(pair) => {
                self.store.save(&pair);
                self.state = SessionState::Authenticated(pair);
                tracing::info!(user = credentials.username(), "signed in");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user = credentials.username(), error = %e, "authentication failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Unconditional. Clears the store even if we were already anonymous.
    pub fn logout(&mut self) {
        self.store.clear();
        self.state = SessionState::Anonymous;
        self.error = None;
        tracing::info!("signed out");
    }

    #[cfg(test)]
    pub fn store(&self) -> &TokenStore<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedTransport;

    fn setup() -> (SessionController<MemoryStore>, ApiClient<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::default();
        let api = ApiClient::new(transport.clone(), "http://api.test/api");
        let session = SessionController::new(TokenStore::new(MemoryStore::default()));
        (session, api, transport)
    }

    fn creds() -> Credentials {
        Credentials::new("alice", "secret1").unwrap()
    }

    #[test]
    fn test_credentials_length_bounds() {
        assert_eq!(Credentials::new("ab", "secret1").unwrap_err(), ValidationError::Username);
        assert_eq!(
            Credentials::new(&"a".repeat(31), "secret1").unwrap_err(),
            ValidationError::Username
        );
        assert_eq!(Credentials::new("abc", "12345").unwrap_err(), ValidationError::Password);
        assert_eq!(
            Credentials::new("abc", &"p".repeat(101)).unwrap_err(),
            ValidationError::Password
        );
        assert!(Credentials::new("abc", "123456").is_ok());
        assert!(Credentials::new(&"a".repeat(30), &"p".repeat(100)).is_ok());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let shown = format!("{:?}", creds());
        assert!(shown.contains("alice"));
        assert!(!shown.contains("secret1"));
    }

    #[tokio::test]
    async fn test_tokenless_success_bodies_are_invalid_tokens() {
        let (mut session, api, transport) = setup();
        for body in ["null", ""] {
            transport.push_json(200, body);
            let err = session.login(&api, &creds()).await.unwrap_err();
            assert_eq!(err.to_string(), "Invalid login response tokens");
            assert_eq!(session.error(), Some("Invalid login response tokens"));

            transport.push_json(201, body);
            let err = session.register(&api, &creds()).await.unwrap_err();
            assert_eq!(err.to_string(), "Invalid register response tokens");
        }
        assert!(!session.is_authenticated());
        assert_eq!(session.store().load(), None);
    }

    #[test]
    fn test_initial_state_follows_store() {
        let mut store = TokenStore::new(MemoryStore::default());
        store.save(&TokenPair::new("A", "R"));
        let session = SessionController::new(store);
        assert!(session.is_authenticated());
        assert_eq!(session.access_token(), Some("A"));

        let empty = SessionController::new(TokenStore::new(MemoryStore::default()));
        assert_eq!(empty.state(), &SessionState::Anonymous);
        assert_eq!(empty.access_token(), None);
    }

    #[tokio::test]
    async fn test_login_success_persists_pair() {
        let (mut session, api, transport) = setup();
        transport.push_json(200, r#"{"access":"A1","refresh":"R1"}"#);

        session.login(&api, &creds()).await.unwrap();

        assert_eq!(session.state(), &SessionState::Authenticated(TokenPair::new("A1", "R1")));
        assert_eq!(session.store().load(), Some(TokenPair::new("A1", "R1")));
        assert_eq!(session.error(), None);
        assert!(transport.requests()[0].url.ends_with("/auth/login/"));
    }

    #[tokio::test]
    async fn test_login_missing_refresh_stays_anonymous() {
        let (mut session, api, transport) = setup();
        transport.push_json(200, r#"{"access":"A1"}"#);

        let err = session.login(&api, &creds()).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidTokens("Invalid login response tokens"));
        assert_eq!(session.state(), &SessionState::Anonymous);
        assert_eq!(session.store().load(), None);
        assert!(session.store().backend().get(crate::store::ACCESS_KEY).is_none());
        assert_eq!(session.error(), Some("Invalid login response tokens"));
    }

    #[tokio::test]
    async fn test_register_uses_register_endpoint_and_message() {
        let (mut session, api, transport) = setup();
        transport.push_json(201, r#"{"refresh":"R"}"#);
        transport.push_json(201, r#"{"access":"A","refresh":"R"}"#);

        let err = session.register(&api, &creds()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid register response tokens");

        session.register(&api, &creds()).await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(transport.count("/auth/register/"), 2);
    }

    #[tokio::test]
    async fn test_server_error_detail_becomes_auth_error() {
        let (mut session, api, transport) = setup();
        transport.push_json(401, r#"{"detail":"No active account found with the given credentials"}"#);

        session.login(&api, &creds()).await.unwrap_err();
        assert_eq!(
            session.error(),
            Some("No active account found with the given credentials")
        );
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_error() {
        let (mut session, api, transport) = setup();
        transport.push_json(401, r#"{"detail":"nope"}"#);
        transport.push_json(200, r#"{"access":"A","refresh":"R"}"#);

        session.login(&api, &creds()).await.unwrap_err();
        assert!(session.error().is_some());
        session.login(&api, &creds()).await.unwrap();
        assert_eq!(session.error(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let (mut session, api, transport) = setup();
        transport.push_json(200, r#"{"access":"A","refresh":"R"}"#);
        session.login(&api, &creds()).await.unwrap();

        session.logout();

        assert_eq!(session.state(), &SessionState::Anonymous);
        assert_eq!(session.store().load(), None);
    }

    #[test]
    fn test_toggle_mode_clears_error() {
        let (mut session, _, _) = setup();
        session.error = Some("old".to_string());
        session.toggle_mode();
        assert_eq!(session.mode(), AuthMode::Register);
        assert_eq!(session.error(), None);
        session.toggle_mode();
        assert_eq!(session.mode(), AuthMode::Login);
    }
}
