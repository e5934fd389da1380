use super::{ConnectionRegistry, SubscriberId};
use crate::metrics::realtime::REALTIME_SUBSCRIBERS;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use content_model::ContentKind;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

/// One WebSocket viewer subscribed to a content kind. Outbound only:
/// inbound text frames are ignored.
pub struct RealtimeSession {
    kind: ContentKind,
    member: String,
    subscriber_id: SubscriberId,
    registry: ConnectionRegistry,
    events: Option<UnboundedReceiver<String>>,
    hb: Instant,
}

impl RealtimeSession {
    pub fn new(
        kind: ContentKind,
        member: String,
        subscriber_id: SubscriberId,
        registry: ConnectionRegistry,
        events: UnboundedReceiver<String>,
    ) -> Self {
        Self {
            kind,
            member,
            subscriber_id,
            registry,
            events: Some(events),
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(member = %act.member, kind = %act.kind, "realtime heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for RealtimeSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(member = %self.member, kind = %self.kind, "realtime session started");
        REALTIME_SUBSCRIBERS
            .with_label_values(&[self.kind.as_str()])
            .inc();

        self.hb(ctx);

        if let Some(mut events) = self.events.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(payload) = events.recv().await {
                    if !addr.connected() {
                        break;
                    }
                    addr.do_send(BroadcastMessage(payload));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(member = %self.member, kind = %self.kind, "realtime session stopped");
        REALTIME_SUBSCRIBERS
            .with_label_values(&[self.kind.as_str()])
            .dec();

        let registry = self.registry.clone();
        let kind = self.kind;
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            registry.remove_subscriber(kind, subscriber_id).await;
        });
    }
}

impl Handler<BroadcastMessage> for RealtimeSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RealtimeSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::debug!(member = %self.member, "binary frames are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(member = %self.member, ?reason, "realtime close received");
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(member = %self.member, error = %e, "realtime protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}
