use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc;

use system::{ConnectionId, SessionCommand, SessionEvent};

use crate::config::ServerConfig;
use crate::connection_tx_storage::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect { tx: ConnectionTx },
    Disconnect { from: ConnectionId },
    SessionCommand {
        from: ConnectionId,
        command: SessionCommand,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    SessionEvent(SessionEvent),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// Waiting for the server to hand out an id. Commands that arrive in the
    /// meantime are queued and forwarded in order once it does.
    Idle { pending: Vec<SessionCommand> },
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    ingress: IngressTx,
    buffer: usize,
}

/// Per-connection queue in front of the server queue.
pub type IngressTx = mpsc::UnboundedSender<ServerCommand>;

/// Relays a connection's commands to the server in order, waiting for room in
/// the server queue instead of dropping them. Ends once every `IngressTx`
/// clone is gone and the backlog is delivered.
pub fn spawn_ingress(mut srv_tx: ServerTx) -> IngressTx {
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerCommand>();

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            if srv_tx.send(command).await.is_err() {
                log::error!("Server loop is gone, dropping connection commands");
                break;
            }
        }
    });

    tx
}

impl ConnectionActor {
    fn submit(&self, command: ConnectionCommand) -> bool {
        match self.ingress.send(ServerCommand::Connection(command)) {
            Ok(()) => true,
            Err(_) => {
                log::error!("Connection ingress is closed, command dropped");
                false
            }
        }
    }

    fn dispatch(&mut self, command: SessionCommand) {
        match &mut self.state {
            ConnectionState::Connected(from) => {
                let from = *from;
                self.submit(ConnectionCommand::SessionCommand { from, command });
            }
            ConnectionState::Idle { pending } => pending.push(command),
        }
    }

    fn reply(&self, event: &SessionEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event.to_json() {
            Ok(text) => ctx.text(text),
            Err(err) => log::error!("Failed to serialize {:?}: {}", event, err),
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = mpsc::channel::<ConnectionEvent>(self.buffer);

        if !self.submit(ConnectionCommand::Connect { tx }) {
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();
        let ingress = self.ingress.clone();

        tokio::spawn(async move {
            log::debug!("connection forwarder - started");
            let mut connection_id = None;
            while let Some(msg) = rx.recv().await {
                if let ConnectionEvent::Connected { connection_id: id } = &msg {
                    connection_id = Some(*id);
                }
                if addr.do_send(ConnectionActorMessage(msg)).is_err() {
                    // the actor may have stopped before it learned its id
                    if let Some(from) = connection_id {
                        let disconnect = ConnectionCommand::Disconnect { from };
                        if ingress.send(ServerCommand::Connection(disconnect)).is_err() {
                            log::error!("Connection {}: disconnect was not delivered", from);
                        }
                    }
                    break;
                }
            }
            log::debug!("connection forwarder - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(from) = self.state {
            self.submit(ConnectionCommand::Disconnect { from });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::debug!("Ingress size: {}", text.len());
                match SessionCommand::from_json(&text) {
                    Ok(command) => {
                        log::debug!("Ingress {:?}", command);
                        self.dispatch(command);
                    }
                    Err(err) => {
                        log::warn!("Rejected malformed event: {}", err);
                        self.reply(&SessionEvent::error(err.to_string()), ctx);
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.reply(&SessionEvent::error("binary frames are not supported"), ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(err) => {
                log::warn!("Websocket protocol error: {}", err);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("Egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Connected { connection_id } => {
                let previous =
                    std::mem::replace(&mut self.state, ConnectionState::Connected(connection_id));
                if let ConnectionState::Idle { pending } = previous {
                    for command in pending {
                        self.submit(ConnectionCommand::SessionCommand {
                            from: connection_id,
                            command,
                        });
                    }
                }
            }
            ConnectionEvent::SessionEvent(event) => self.reply(&event, ctx),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            ingress: spawn_ingress(srv_tx.get_ref().clone()),
            state: ConnectionState::Idle {
                pending: Vec::new(),
            },
            buffer: config.connection_buffer,
        },
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn ingress_waits_for_room_and_keeps_order() {
        let (srv_tx, mut srv_rx) = mpsc::channel::<ServerCommand>(1);
        let ingress = spawn_ingress(srv_tx);
        for from in 0..16 {
            let disconnect = ConnectionCommand::Disconnect { from };
            ingress
                .send(ServerCommand::Connection(disconnect))
                .expect("");
        }
        drop(ingress);

        for expected in 0..16 {
            match timeout(Duration::from_secs(1), srv_rx.recv()).await {
                Ok(Some(ServerCommand::Connection(ConnectionCommand::Disconnect { from }))) => {
                    assert_eq!(from, expected)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        let closed = timeout(Duration::from_secs(1), srv_rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }
}
