/// One notifications connection
///
/// The session registers itself on start, deregisters on stop, pushes the
/// catch-up batch (prepared by the route handler) right after connecting,
/// and handles inbound view-count reports from the player.
use actix::prelude::*;
use actix_web_actors::ws;
use tracing::{debug, warn};

use crate::cache::ViewCounter;
use crate::websocket::message_types::ClientEvent;
use crate::websocket::{ConnectionRegistry, SubscriberId};

/// A serialized envelope pushed to this connection.
#[derive(Clone, Message)]
#[rtype(result = "()")]
pub struct PushMessage(pub String);

pub struct NotificationSession {
    id: SubscriberId,
    registry: ConnectionRegistry,
    counter: ViewCounter,
    /// Pre-serialized batch-video-update, present when the catch-up query
    /// found records newer than the client's token.
    catchup: Option<String>,
}

impl NotificationSession {
    pub fn new(
        registry: ConnectionRegistry,
        counter: ViewCounter,
        catchup: Option<String>,
    ) -> Self {
        Self {
            id: SubscriberId::new(),
            registry,
            counter,
            catchup,
        }
    }
}

impl Actor for NotificationSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let registry = self.registry.clone();
        let id = self.id;
        let addr = ctx.address();
        actix_rt::spawn(async move {
            registry.add(id, addr).await;
        });

        // Nothing is sent when the client is already up to date.
        if let Some(batch) = self.catchup.take() {
            ctx.text(batch);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let registry = self.registry.clone();
        let id = self.id;
        actix_rt::spawn(async move {
            registry.remove(id).await;
        });
    }
}

impl Handler<PushMessage> for NotificationSession {
    type Result = ();

    fn handle(&mut self, msg: PushMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for NotificationSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::IncrementViewCount { payload }) => {
                    let counter = self.counter.clone();
                    actix_rt::spawn(async move {
                        if let Err(e) = counter.record_view(&payload).await {
                            warn!(reference = %payload, error = %e, "View count update failed");
                        }
                    });
                }
                Err(_) => {
                    debug!("Ignoring unrecognized client message");
                }
            },
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Binary(_)) | Ok(ws::Message::Continuation(_)) => {
                warn!("Unsupported websocket frame (closing connection)");
                ctx.stop();
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
