use roomlink_types::models::User;

/// Identity and bearer token for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: User,
    pub token: String,
}

/// Process-wide session store. Issuing and validating tokens happens
/// elsewhere; the engine only reads whatever is current.
pub trait SessionAccessor: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;
}

/// Session with fixed credentials, for callers that sign in up front.
#[derive(Debug, Clone)]
pub struct StaticSession {
    credentials: Option<Credentials>,
}

impl StaticSession {
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            credentials: Some(Credentials {
                user,
                token: token.into(),
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self { credentials: None }
    }
}

impl SessionAccessor for StaticSession {
    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}
