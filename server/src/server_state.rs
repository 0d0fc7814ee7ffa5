use crate::session::Session;
use std::collections::HashMap;
use std::num::Wrapping;
use system::{
    Admission, ConnectionId, DocumentLimits, Participant, RelayError, SessionId, SessionSnapshot,
    UserId,
};

/// A `(session, user)` pair a connection joined as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub session_id: SessionId,
    pub user_id: UserId,
}

pub struct Joined {
    pub participant: Participant,
    pub is_new: bool,
    pub snapshot: SessionSnapshot,
    pub others: Vec<ConnectionId>,
}

/// What remains after a connection stopped representing a user in a session.
#[derive(Debug)]
pub struct Departure {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub removed: Option<Participant>,
    pub remaining: Vec<ConnectionId>,
    pub evicted: bool,
}

pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    /// Connections that are open; each lists what it joined, empty while
    /// merely connected.
    pub memberships: HashMap<ConnectionId, Vec<Membership>>,
    pub sessions: HashMap<SessionId, Session>,

    limits: DocumentLimits,
    evict_empty_sessions: bool,
}

impl ServerState {
    pub fn new(limits: DocumentLimits, evict_empty_sessions: bool) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            memberships: HashMap::new(),
            sessions: HashMap::new(),
            limits,
            evict_empty_sessions,
        }
    }

    pub fn create_connection(&mut self) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.memberships.insert(connection_id, Vec::new());
        connection_id
    }

    pub fn get_or_create_session(&mut self, session_id: &SessionId) -> &mut Session {
        let limits = &self.limits;
        self.sessions.entry(session_id.clone()).or_insert_with(|| {
            log::info!("Session {} created", session_id);
            Session::new(limits)
        })
    }

    pub fn join_session(
        &mut self,
        connection_id: ConnectionId,
        session_id: &SessionId,
        user_id: &str,
        username: &str,
    ) -> Joined {
        let session = self.get_or_create_session(session_id);
        let Admission {
            participant,
            is_new,
        } = session.document.admit(user_id, username);
        session.add_connection(connection_id);
        let snapshot = session.document.snapshot(session_id);
        let others = session
            .connections
            .iter()
            .filter(|c| **c != connection_id)
            .cloned()
            .collect();

        let membership = Membership {
            session_id: session_id.clone(),
            user_id: user_id.to_owned(),
        };
        let joined = self.memberships.entry(connection_id).or_insert_with(Vec::new);
        if !joined.contains(&membership) {
            joined.push(membership);
        }

        log::info!(
            "Connection {} joined session {} as {}",
            connection_id,
            session_id,
            user_id
        );
        Joined {
            participant,
            is_new,
            snapshot,
            others,
        }
    }

    /// Explicit leave: the participant is removed even if another
    /// connection still represents the same user.
    pub fn leave_session(
        &mut self,
        connection_id: ConnectionId,
        session_id: &SessionId,
        user_id: &str,
    ) -> Result<Departure, RelayError> {
        if !self.sessions.contains_key(session_id) {
            return Err(RelayError::SessionNotFound(session_id.clone()));
        }
        Ok(self.detach(connection_id, session_id, user_id, true))
    }

    /// Implicit leave for every membership of a closed connection. A user is
    /// only dropped from the roster when no other connection represents them.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Departure> {
        let memberships = self.memberships.remove(&connection_id).unwrap_or_default();
        let mut departures = Vec::new();
        for Membership {
            session_id,
            user_id,
        } in memberships
        {
            if self.sessions.contains_key(&session_id) {
                departures.push(self.detach(connection_id, &session_id, &user_id, false));
            }
        }
        // a connection that never joined anything may still sit in a group
        for session in self.sessions.values_mut() {
            session.remove_connection(&connection_id);
        }
        departures
    }

    /// The user a connection joined `session_id` as, if any.
    pub fn user_of(&self, connection_id: ConnectionId, session_id: &str) -> Option<&UserId> {
        self.memberships
            .get(&connection_id)?
            .iter()
            .find(|m| m.session_id == session_id)
            .map(|m| &m.user_id)
    }

    pub fn memberships_of(&self, connection_id: ConnectionId) -> &[Membership] {
        self.memberships
            .get(&connection_id)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    pub fn connection_ids_in_session(
        &self,
        session_id: &str,
    ) -> Result<&[ConnectionId], RelayError> {
        self.sessions
            .get(session_id)
            .map(|s| s.connections.as_slice())
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_owned()))
    }

    fn detach(
        &mut self,
        connection_id: ConnectionId,
        session_id: &SessionId,
        user_id: &str,
        force: bool,
    ) -> Departure {
        if let Some(joined) = self.memberships.get_mut(&connection_id) {
            joined.retain(|m| !(m.session_id == *session_id && m.user_id == user_id));
        }
        let still_member = self
            .memberships
            .get(&connection_id)
            .map(|joined| joined.iter().any(|m| m.session_id == *session_id))
            .unwrap_or(false);
        let represented_elsewhere = self.memberships.iter().any(|(c, joined)| {
            *c != connection_id
                && joined
                    .iter()
                    .any(|m| m.session_id == *session_id && m.user_id == user_id)
        });

        let mut departure = Departure {
            session_id: session_id.clone(),
            user_id: user_id.to_owned(),
            removed: None,
            remaining: Vec::new(),
            evicted: false,
        };

        if let Some(session) = self.sessions.get_mut(session_id) {
            if !still_member {
                session.remove_connection(&connection_id);
            }
            if force || !represented_elsewhere {
                departure.removed = session.document.remove_participant(user_id);
            }
            departure.remaining = session
                .connections
                .iter()
                .filter(|c| **c != connection_id)
                .cloned()
                .collect();
            departure.evicted = self.evict_empty_sessions && session.connections.is_empty();
        }

        if departure.evicted {
            self.sessions.remove(session_id);
            log::info!("Session {} evicted, no connections left", session_id);
        }
        log::info!(
            "Connection {} left session {} as {}",
            connection_id,
            session_id,
            user_id
        );
        departure
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }
}
