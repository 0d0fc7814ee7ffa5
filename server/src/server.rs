use serde_json::{json, Value};
use tokio::sync::mpsc::{channel, Sender};

use system::{
    now, ActivityKind, ChatMessageCommand, ChatMessageEvent, ConnectionId, CursorUpdatedEvent,
    JoinSessionCommand, OverlayUpdatedEvent, RelayError, SessionCommand, SessionDocument,
    SessionEvent, UserJoinedEvent,
};

use crate::admin::{AdminCommand, Presence, SessionSummary};
use crate::config::ServerConfig;
use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::server_state::{Departure, ServerState};

const SERVER_QUEUE_CAPACITY: usize = 1024;

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

/// Owns every session. Commands are applied one at a time, to completion,
/// in the order they were queued.
pub struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
}

impl Server {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            server_state: ServerState::new(
                config.document_limits.clone(),
                config.evict_empty_sessions,
            ),
            connections: ConnectionTxStorage::new(),
        }
    }

    pub fn handle_server_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command),
            ServerCommand::Admin(command) => self.handle_admin_command(command),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.server_state.create_connection();
                self.connections.insert(connection_id, tx);
                log::info!(
                    "Connection {} opened ({} open)",
                    connection_id,
                    self.connections.len()
                );
                if !self
                    .connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                {
                    log::debug!("Connection {} went away before it got an id", connection_id);
                    self.close_connection(connection_id);
                }
            }
            ConnectionCommand::Disconnect { from } => self.close_connection(from),
            ConnectionCommand::SessionCommand { from, command } => {
                let session_id = command.session_id().cloned();
                if let Err(err) = self.handle_session_command(from, command) {
                    if err.is_client_fault() {
                        log::warn!("Connection {}: rejected command: {}", from, err);
                        self.send(from, SessionEvent::error(err.to_string()));
                    } else {
                        log::warn!(
                            "Connection {}: ignored command for session {}: {}",
                            from,
                            session_id.unwrap_or_default(),
                            err
                        );
                    }
                }
            }
        }
    }

    /// Implicit leave for everything the connection joined. Safe to repeat.
    fn close_connection(&mut self, connection_id: ConnectionId) {
        for departure in self.server_state.disconnect(connection_id) {
            if departure.removed.is_some() {
                self.announce_departure(departure);
            }
        }
        if self.connections.remove(&connection_id).is_some() {
            log::info!("Connection {} closed", connection_id);
        }
    }

    fn handle_session_command(
        &mut self,
        from: ConnectionId,
        command: SessionCommand,
    ) -> Result<(), RelayError> {
        match command {
            SessionCommand::JoinSession(JoinSessionCommand {
                session_id,
                user_id,
                username,
            }) => {
                let joined = self
                    .server_state
                    .join_session(from, &session_id, &user_id, &username);
                if !joined.is_new {
                    log::debug!("User {} rejoined session {}", user_id, session_id);
                }
                self.send(from, SessionEvent::SessionState(joined.snapshot));
                self.send_to(
                    &joined.others,
                    SessionEvent::UserJoined(UserJoinedEvent::from(&joined.participant)),
                );
            }
            SessionCommand::LeaveSession(c) => {
                let departure = self
                    .server_state
                    .leave_session(from, &c.session_id, &c.user_id)?;
                self.announce_departure(departure);
            }
            SessionCommand::UserUpdate(c) => {
                self.document_mut(&c.session_id)?
                    .update_participant(&c.user.user_id, &c.user.fields)?;
                self.broadcast(&c.session_id, SessionEvent::UserUpdate(c.user), Some(from));
            }
            SessionCommand::Operation(c) => {
                self.document_mut(&c.session_id)?
                    .append_operation(c.operation.clone());
                self.broadcast(&c.session_id, SessionEvent::Operation(c.operation), Some(from));
            }
            SessionCommand::PoseAnalysisUpdate(c) => {
                self.document_mut(&c.session_id)?
                    .set_pose_analysis(c.update.clone());
                // the sender renders the confirmed result too
                self.broadcast(&c.session_id, SessionEvent::PoseAnalysisUpdate(c.update), None);
            }
            SessionCommand::OverlayCreate(c) => {
                let user_id = self.server_state.user_of(from, &c.session_id).cloned();
                let document = self.document_mut(&c.session_id)?;
                if document.upsert_overlay(c.overlay.clone()) {
                    log::debug!("Overlay {} replaced in session {}", c.overlay.id, c.session_id);
                }
                document.record_activity(
                    ActivityKind::OverlayCreated,
                    user_id,
                    Value::from(&c.overlay),
                );
                self.broadcast(&c.session_id, SessionEvent::OverlayCreated(c.overlay), Some(from));
            }
            SessionCommand::OverlayUpdate(c) => {
                let user_id = self.server_state.user_of(from, &c.session_id).cloned();
                let document = self.document_mut(&c.session_id)?;
                document.update_overlay(&c.overlay_id, &c.updates)?;
                document.record_activity(
                    ActivityKind::OverlayUpdated,
                    user_id,
                    json!({ "overlayId": c.overlay_id, "updates": c.updates }),
                );
                self.broadcast(
                    &c.session_id,
                    SessionEvent::OverlayUpdated(OverlayUpdatedEvent {
                        overlay_id: c.overlay_id,
                        updates: c.updates,
                    }),
                    Some(from),
                );
            }
            SessionCommand::OverlayDelete(c) => {
                let user_id = self.server_state.user_of(from, &c.session_id).cloned();
                let document = self.document_mut(&c.session_id)?;
                document.remove_overlay(&c.overlay_id)?;
                document.record_activity(
                    ActivityKind::OverlayDeleted,
                    user_id,
                    Value::String(c.overlay_id.clone()),
                );
                self.broadcast(&c.session_id, SessionEvent::OverlayDeleted(c.overlay_id), Some(from));
            }
            SessionCommand::CursorUpdate(c) => {
                self.document_mut(&c.session_id)?
                    .move_cursor(&c.user_id, c.position)?;
                self.broadcast(
                    &c.session_id,
                    SessionEvent::CursorUpdated(CursorUpdatedEvent {
                        user_id: c.user_id,
                        position: c.position,
                    }),
                    Some(from),
                );
            }
            SessionCommand::ChatMessage(c) => self.chat(c)?,
            SessionCommand::Ping => {
                let memberships = self.server_state.memberships_of(from).to_vec();
                for membership in memberships {
                    if let Ok(document) = self.document_mut(&membership.session_id) {
                        document.touch_participant(&membership.user_id);
                    }
                }
                self.send(from, SessionEvent::Pong);
            }
        }
        Ok(())
    }

    fn chat(&mut self, c: ChatMessageCommand) -> Result<(), RelayError> {
        let document = self.document_mut(&c.session_id)?;
        let username = document
            .participant(&c.user_id)
            .map(|p| p.username.clone())
            .unwrap_or_else(|| c.user_id.clone());
        document.touch_participant(&c.user_id);
        document.record_activity(
            ActivityKind::ChatMessage,
            Some(c.user_id.clone()),
            json!({ "message": c.message }),
        );
        let event = SessionEvent::ChatMessage(ChatMessageEvent {
            user_id: c.user_id,
            username,
            message: c.message,
            timestamp: now(),
        });
        self.broadcast(&c.session_id, event, None);
        Ok(())
    }

    fn handle_admin_command(&mut self, command: AdminCommand) {
        match command {
            AdminCommand::ListSessions { tx } => {
                let mut summaries: Vec<SessionSummary> = self
                    .server_state
                    .sessions
                    .iter()
                    .map(|(session_id, session)| SessionSummary {
                        session_id: session_id.clone(),
                        users: session.document.users().len(),
                        connections: session.connections.len(),
                    })
                    .collect();
                summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
                if tx.send(summaries).is_err() {
                    log::debug!("Admin requester went away before the session list was ready");
                }
            }
            AdminCommand::GetPresence {
                session_id,
                limit,
                tx,
            } => {
                let presence = self
                    .server_state
                    .sessions
                    .get(&session_id)
                    .map(|session| Presence {
                        session_id: session_id.clone(),
                        users: session.document.users().to_vec(),
                        recent_activity: session.document.recent_activity(limit),
                        timestamp: now(),
                    })
                    .ok_or_else(|| RelayError::SessionNotFound(session_id.clone()));
                if tx.send(presence).is_err() {
                    log::debug!("Admin requester went away before presence was ready");
                }
            }
            AdminCommand::NotifyRenderProgress {
                session_id,
                progress,
                tx,
            } => {
                let payload = serde_json::to_value(&progress);
                let result = self.document_mut(&session_id).map(|document| match payload {
                    Ok(payload) => {
                        document.record_activity(ActivityKind::RenderProgress, None, payload)
                    }
                    Err(err) => log::error!("Failed to serialize {:?}: {}", progress, err),
                });
                let result = result.map(|_| {
                    self.broadcast(&session_id, SessionEvent::RenderProgress(progress), None)
                });
                if tx.send(result).is_err() {
                    log::debug!("Admin requester went away before render progress was relayed");
                }
            }
        }
    }

    fn document_mut(&mut self, session_id: &str) -> Result<&mut SessionDocument, RelayError> {
        self.server_state
            .sessions
            .get_mut(session_id)
            .map(|session| &mut session.document)
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_owned()))
    }

    fn announce_departure(&mut self, departure: Departure) {
        let Departure {
            session_id,
            user_id,
            remaining,
            evicted,
            ..
        } = departure;
        if evicted {
            log::debug!("Session {} closed after {} left", session_id, user_id);
            return;
        }
        self.send_to(&remaining, SessionEvent::UserLeft(user_id));
    }

    /// Sends to every connection in the session's group except `without`.
    /// Returns the number of recipients.
    fn broadcast(
        &mut self,
        session_id: &str,
        event: SessionEvent,
        without: Option<ConnectionId>,
    ) -> usize {
        let targets: Vec<ConnectionId> = match self.server_state.connection_ids_in_session(session_id)
        {
            Ok(conns) => conns
                .iter()
                .filter(|c| Some(**c) != without)
                .cloned()
                .collect(),
            Err(_) => return 0,
        };
        self.send_to(&targets, event);
        targets.len()
    }

    fn send_to(&mut self, targets: &[ConnectionId], event: SessionEvent) {
        for connection_id in targets {
            self.connections
                .send(connection_id, ConnectionEvent::SessionEvent(event.clone()));
        }
    }

    fn send(&mut self, to: ConnectionId, event: SessionEvent) {
        self.connections
            .send(&to, ConnectionEvent::SessionEvent(event));
    }
}

pub fn spawn_server(config: &ServerConfig) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(SERVER_QUEUE_CAPACITY);
    let config = config.clone();

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(&config));
        log::info!("server loop - started");

        while let Some(command) = srv_rx.recv().await {
            server.handle_server_command(command);
        }
        log::info!("server loop - terminated");
    });

    srv_tx
}
