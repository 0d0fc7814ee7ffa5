use crate::admin::{AdminCommand, Presence, SessionSummary};
use crate::server::{ServerCommand, ServerTx};
use actix_web::error;
use actix_web::web::{self, HttpResponse};
use actix_web::Result;
use serde::Deserialize;
use serde_json::json;
use system::{RelayError, RenderProgressEvent};

const DEFAULT_PRESENCE_LIMIT: usize = 50;

pub fn configure_session_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sessions")
            .service(web::resource("").route(web::get().to(list_sessions)))
            .service(
                web::resource("/{session_id}/presence")
                    .name("session_presence")
                    .route(web::get().to(show_presence)),
            )
            .service(
                web::resource("/{session_id}/render-progress")
                    .name("session_render_progress")
                    .route(web::post().to(notify_render_progress)),
            ),
    );
}

#[derive(Deserialize)]
pub struct SessionPathParam {
    session_id: String,
}

#[derive(Deserialize)]
pub struct PresenceQuery {
    limit: Option<usize>,
}

async fn submit(srv_tx: &web::Data<ServerTx>, command: AdminCommand) -> Result<()> {
    srv_tx
        .get_ref()
        .clone()
        .send(ServerCommand::Admin(command))
        .await
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))
}

fn session_error(err: RelayError) -> actix_web::Error {
    match err {
        RelayError::SessionNotFound(_) => error::ErrorNotFound(err.to_string()),
        err => error::ErrorInternalServerError(err.to_string()),
    }
}

pub async fn list_sessions(srv_tx: web::Data<ServerTx>) -> Result<HttpResponse> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Vec<SessionSummary>>();
    submit(&srv_tx, AdminCommand::ListSessions { tx }).await?;

    let sessions = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn show_presence(
    path: web::Path<SessionPathParam>,
    query: web::Query<PresenceQuery>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Result<Presence, RelayError>>();
    submit(
        &srv_tx,
        AdminCommand::GetPresence {
            session_id: path.session_id.clone(),
            limit: query.limit.unwrap_or(DEFAULT_PRESENCE_LIMIT),
            tx,
        },
    )
    .await?;

    let presence = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?
        .map_err(session_error)?;
    Ok(HttpResponse::Ok().json(presence))
}

pub async fn notify_render_progress(
    path: web::Path<SessionPathParam>,
    body: web::Json<RenderProgressEvent>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Result<usize, RelayError>>();
    submit(
        &srv_tx,
        AdminCommand::NotifyRenderProgress {
            session_id: path.session_id.clone(),
            progress: body.into_inner(),
            tx,
        },
    )
    .await?;

    let recipients = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?
        .map_err(session_error)?;
    Ok(HttpResponse::Ok().json(json!({ "recipients": recipients })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::connection::{ConnectionCommand, ConnectionEvent};
    use crate::server::spawn_server;
    use actix_web::dev::{Body, ResponseBody};
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;
    use serde_json::Value;
    use system::SessionCommand;
    use tokio::sync::mpsc::{channel, Receiver};

    fn path(session_id: &str) -> web::Path<SessionPathParam> {
        web::Path::from(SessionPathParam {
            session_id: session_id.to_owned(),
        })
    }

    fn status_of(result: Result<HttpResponse>) -> StatusCode {
        match result {
            Ok(resp) => resp.status(),
            Err(err) => err.as_response_error().status_code(),
        }
    }

    fn json_body(resp: &HttpResponse) -> Value {
        match resp.body() {
            ResponseBody::Body(Body::Bytes(bytes)) => {
                serde_json::from_slice(bytes).expect("json body")
            }
            _ => panic!("expected a buffered body"),
        }
    }

    /// Joins `session_id` as user `a` and posts `messages` chat lines.
    async fn chatty_session(
        srv_tx: &ServerTx,
        session_id: &str,
        messages: usize,
    ) -> Receiver<ConnectionEvent> {
        let mut srv_tx = srv_tx.clone();
        let (tx, mut rx) = channel(256);
        srv_tx
            .send(ServerCommand::Connection(ConnectionCommand::Connect { tx }))
            .await
            .expect("");
        let from = match rx.recv().await {
            Some(ConnectionEvent::Connected { connection_id }) => connection_id,
            other => panic!("expected Connected, got {:?}", other),
        };

        let mut commands = vec![json!({
            "event": "join-session",
            "data": { "sessionId": session_id, "userId": "a", "username": "A" }
        })];
        for i in 0..messages {
            commands.push(json!({
                "event": "chat-message",
                "data": { "sessionId": session_id, "userId": "a", "message": i.to_string() }
            }));
        }
        for raw in commands {
            let command = SessionCommand::from_json(&raw.to_string()).expect("valid command");
            srv_tx
                .send(ServerCommand::Connection(ConnectionCommand::SessionCommand {
                    from,
                    command,
                }))
                .await
                .expect("");
        }
        rx
    }

    #[tokio::test]
    async fn presence_defaults_to_fifty_recent_entries() {
        let srv_tx = spawn_server(&ServerConfig::default());
        let _client = chatty_session(&srv_tx, "s1", 60).await;
        let data = web::Data::new(srv_tx);

        let resp = show_presence(path("s1"), web::Query(PresenceQuery { limit: None }), data.clone())
            .await
            .expect("presence");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(&resp);
        assert_eq!(body["sessionId"], json!("s1"));
        assert_eq!(body["users"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            body["recentActivity"].as_array().map(Vec::len),
            Some(DEFAULT_PRESENCE_LIMIT)
        );
        assert_eq!(body["recentActivity"][49]["payload"]["message"], json!("59"));

        let resp = show_presence(path("s1"), web::Query(PresenceQuery { limit: Some(5) }), data)
            .await
            .expect("presence");
        assert_eq!(json_body(&resp)["recentActivity"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn lists_sessions_in_id_order() {
        let srv_tx = spawn_server(&ServerConfig::default());
        let _b = chatty_session(&srv_tx, "s2", 0).await;
        let _a = chatty_session(&srv_tx, "s1", 0).await;

        let resp = list_sessions(web::Data::new(srv_tx)).await.expect("list");
        assert_eq!(
            json_body(&resp),
            json!([
                { "sessionId": "s1", "users": 1, "connections": 1 },
                { "sessionId": "s2", "users": 1, "connections": 1 },
            ])
        );
    }

    #[tokio::test]
    async fn render_progress_counts_recipients() {
        let srv_tx = spawn_server(&ServerConfig::default());
        let _client = chatty_session(&srv_tx, "s1", 0).await;

        let progress = RenderProgressEvent {
            render_id: "r1".into(),
            progress: 1.0,
            status: "done".into(),
        };
        let resp = notify_render_progress(path("s1"), web::Json(progress), web::Data::new(srv_tx))
            .await
            .expect("render progress");
        assert_eq!(json_body(&resp), json!({ "recipients": 1 }));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let data = web::Data::new(spawn_server(&ServerConfig::default()));

        let presence =
            show_presence(path("nope"), web::Query(PresenceQuery { limit: None }), data.clone())
                .await;
        assert_eq!(status_of(presence), StatusCode::NOT_FOUND);

        let progress = RenderProgressEvent {
            render_id: "r1".into(),
            progress: 0.1,
            status: "rendering".into(),
        };
        let progress = notify_render_progress(path("nope"), web::Json(progress), data).await;
        assert_eq!(status_of(progress), StatusCode::NOT_FOUND);
    }
}
