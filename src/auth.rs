//! Caller identity.
//!
//! Bearer tokens are issued and checked by an [`AuthGateway`]. Production
//! deployments plug in their identity provider; [`StaticAuthGateway`] serves
//! local runs from the user list in the configuration.

use std::collections::HashMap;
use std::fmt::Write as _;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::board::{BoardId, GroupId};
use crate::error::{GridError, GridResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Lecturer,
    Board,
    Admin,
}

impl UserType {
    /// Whether this user may drive the game.
    pub fn is_facilitator(self) -> bool {
        matches!(self, UserType::Lecturer | UserType::Admin)
    }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub user_type: UserType,
    pub group_id: GroupId,
    pub display_name: Option<String>,
}

impl Identity {
    /// # Errors
    ///
    /// [`GridError::Forbidden`] unless the caller is a lecturer or admin.
    pub fn require_facilitator(&self) -> GridResult<()> {
        if self.user_type.is_facilitator() {
            Ok(())
        } else {
            Err(GridError::Forbidden)
        }
    }

    /// The board this identity speaks for.
    ///
    /// # Errors
    ///
    /// [`GridError::Forbidden`] unless the caller is a board.
    pub fn board_id(&self) -> GridResult<BoardId> {
        match self.user_type {
            UserType::Board => Ok(BoardId(self.user_id.clone())),
            _ => Err(GridError::Forbidden),
        }
    }
}

/// A bearer token and the identity behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(flatten)]
    pub identity: Identity,
}

pub trait AuthGateway: Send + Sync {
    /// Exchanges credentials for a session.
    fn login(&self, username: &str, password: &str) -> GridResult<Session>;

    /// Resolves a bearer token to the identity it was issued for.
    fn verify(&self, token: &str) -> GridResult<Identity>;
}

/// A configured user account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserAccount {
    pub username: String,
    pub password: String,
    pub user_type: UserType,
    pub group_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Fixed user list with in-memory random tokens, one per user. Logging in
/// again hands back the user's existing token.
pub struct StaticAuthGateway {
    users: HashMap<String, UserAccount>,
    sessions: RwLock<SessionTable>,
}

#[derive(Default)]
struct SessionTable {
    by_token: HashMap<String, Identity>,
    by_user: HashMap<String, String>,
}

impl StaticAuthGateway {
    pub fn new(users: impl IntoIterator<Item = UserAccount>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect(),
            sessions: RwLock::new(SessionTable::default()),
        }
    }

    /// Number of live tokens.
    pub fn session_count(&self) -> usize {
        self.sessions.read().by_token.len()
    }
}

fn new_token() -> String {
    let bytes: [u8; 24] = rand::random();
    bytes.iter().fold(String::with_capacity(48), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

impl AuthGateway for StaticAuthGateway {
    fn login(&self, username: &str, password: &str) -> GridResult<Session> {
        let Some(user) = self.users.get(username).filter(|u| u.password == password) else {
            warn!(username, "login rejected");
            return Err(GridError::Unauthorized);
        };
        let identity = Identity {
            user_id: user.username.clone(),
            user_type: user.user_type,
            group_id: GroupId(user.group_id.clone()),
            display_name: user.display_name.clone(),
        };
        let token = {
            let mut sessions = self.sessions.write();
            let SessionTable { by_token, by_user } = &mut *sessions;
            let token = by_user
                .entry(user.username.clone())
                .or_insert_with(new_token)
                .clone();
            by_token.insert(token.clone(), identity.clone());
            token
        };
        info!(username, user_type = ?user.user_type, group = %identity.group_id, "login");
        Ok(Session { token, identity })
    }

    fn verify(&self, token: &str) -> GridResult<Identity> {
        self.sessions
            .read()
            .by_token
            .get(token)
            .cloned()
            .ok_or(GridError::Unauthorized)
    }
}
