use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use foodlink_db::Database;
use foodlink_types::api::Claims;
use foodlink_types::events::{GatewayCommand, GatewayEvent, RowFilter, Table};
use foodlink_types::models::VolunteerTask;

use crate::dispatcher::Dispatcher;
use crate::subscriptions::{self, Identity, Subscription, Subscriptions};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Sender = SplitSink<WebSocket, Message>;
type Receiver = SplitStream<WebSocket>;
type SharedSubscriptions = Arc<RwLock<Subscriptions>>;

/// Handle a single WebSocket connection: Identify, Ready, then the
/// subscribe/forward loop until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Database, jwt_secret: String) {
    serve_socket(socket, dispatcher, db, jwt_secret, IDENTIFY_TIMEOUT).await
}

async fn serve_socket(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Database,
    jwt_secret: String,
    identify_timeout: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let Some(identity) = wait_for_identify(&mut receiver, &db, &jwt_secret, identify_timeout).await else {
        warn!("WebSocket client failed to identify, closing");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    info!("{} ({}) connected to gateway", identity.user_id, identity.role);

    let ready = GatewayEvent::Ready {
        user_id: identity.user_id,
        role: identity.role,
    };
    if !send_event(&mut sender, &ready).await {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, db, identity).await;
}

async fn run_connection_loop(
    mut sender: Sender,
    mut receiver: Receiver,
    dispatcher: Dispatcher,
    db: Database,
    identity: Identity,
) {
    let (conn_id, mut user_rx) = dispatcher.register_connection(identity.user_id).await;
    let mut changes_rx = dispatcher.subscribe();

    // Shared between the send and recv tasks
    let subscriptions: SharedSubscriptions = Arc::new(RwLock::new(Subscriptions::default()));
    let send_subscriptions = subscriptions.clone();

    // Replies to Subscribe/Unsubscribe are routed through the send task
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::unbounded_channel::<GatewayEvent>();

    let user_id = identity.user_id;
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = changes_rx.recv() => {
                    let change = match result {
                        Ok(change) => change,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Change feed receiver lagged by {} events", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    // A task update can remove the caller from a chat they subscribed to
                    if change.table == Table::VolunteerTasks {
                        if let Ok(task) = serde_json::from_value::<VolunteerTask>(change.record.clone()) {
                            let revoked = send_subscriptions
                                .write()
                                .unwrap_or_else(PoisonError::into_inner)
                                .revoke_chat(&task, user_id);
                            for id in revoked {
                                info!("{} lost chat subscription '{}' on task {}", user_id, id, task.id);
                                let event = GatewayEvent::SubscriptionRejected {
                                    id,
                                    reason: "no longer a participant in this task".into(),
                                };
                                if !send_event(&mut sender, &event).await {
                                    return;
                                }
                            }
                        }
                    }

                    let matching = send_subscriptions
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .matching(&change);

                    for subscription in matching {
                        let event = GatewayEvent::Change {
                            subscription,
                            table: change.table,
                            kind: change.kind,
                            record: change.record.clone(),
                        };
                        if !send_event(&mut sender, &event).await {
                            return;
                        }
                    }
                }
                Some(event) = user_rx.recv() => {
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                Some(event) = reply_rx.recv() => {
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if let Some(reply) = handle_command(&db, &identity, cmd, &subscriptions).await {
                            let _ = reply_tx.send(reply);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            identity.user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_connection(identity.user_id, conn_id).await;
    info!("{} disconnected from gateway", identity.user_id);
}

/// The first text frame must be a valid Identify. The role is read from the
/// store, not the token, so role changes apply to new connections immediately.
async fn wait_for_identify(
    receiver: &mut Receiver,
    db: &Database,
    jwt_secret: &str,
    timeout: Duration,
) -> Option<Identity> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let token = tokio::time::timeout(timeout, async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    return match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(GatewayCommand::Identify { token }) => Some(token),
                        _ => None,
                    };
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await
    .ok()
    .flatten()?;

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| debug!("Identify rejected: {}", e))
    .ok()?
    .claims;

    let db = db.clone();
    let user_id = claims.sub;
    let role = match tokio::task::spawn_blocking(move || db.get_role(user_id)).await {
        Ok(Ok(Some(role))) => role,
        Ok(Ok(None)) => return None,
        Ok(Err(e)) => {
            error!("DB error reading role for {}: {}", user_id, e);
            return None;
        }
        Err(e) => {
            error!("spawn_blocking panicked: {}", e);
            return None;
        }
    };

    Some(Identity { user_id, role })
}

async fn handle_command(
    db: &Database,
    identity: &Identity,
    cmd: GatewayCommand,
    subscriptions: &SharedSubscriptions,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Identify { .. } => None, // Already handled

        GatewayCommand::Subscribe { id, table, event, filter } => {
            match check_subscription(db, identity, table, filter.as_ref()).await {
                Ok(()) => {
                    info!("{} subscribed '{}' to {:?}", identity.user_id, id, table);
                    subscriptions
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(id.clone(), Subscription { table, event, filter });
                    Some(GatewayEvent::Subscribed { id })
                }
                Err(reason) => {
                    info!("{} subscription '{}' rejected: {}", identity.user_id, id, reason);
                    Some(GatewayEvent::SubscriptionRejected { id, reason })
                }
            }
        }

        GatewayCommand::Unsubscribe { id } => {
            subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            None
        }
    }
}

async fn check_subscription(
    db: &Database,
    identity: &Identity,
    table: Table,
    filter: Option<&RowFilter>,
) -> Result<(), String> {
    let task = match (table, subscriptions::chat_task_id(filter)) {
        (Table::ChatMessages, Some(task_id)) => {
            let db = db.clone();
            match tokio::task::spawn_blocking(move || db.get_task(task_id)).await {
                Ok(Ok(task)) => task,
                Ok(Err(e)) => {
                    error!("DB error loading task {}: {}", task_id, e);
                    return Err("internal error".into());
                }
                Err(e) => {
                    error!("spawn_blocking panicked: {}", e);
                    return Err("internal error".into());
                }
            }
        }
        _ => None,
    };

    subscriptions::authorize(identity, table, filter, task.as_ref())
}

/// Serialize and send one event. Returns false once the socket is gone.
async fn send_event(sender: &mut Sender, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Router,
        extract::{State, WebSocketUpgrade},
        response::IntoResponse,
        routing::get,
    };
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
    use uuid::Uuid;

    use foodlink_types::events::{ChangeEvent, ChangeKind, EventFilter};
    use foodlink_types::lifecycle::TaskAction;
    use foodlink_types::models::{Donation, DonationStatus, Notification, Role};

    use super::*;

    const SECRET: &str = "gateway-test-secret";

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    #[derive(Clone)]
    struct Harness {
        dispatcher: Dispatcher,
        db: Database,
    }

    async fn upgrade(State(h): State<Harness>, ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(move |socket| {
            serve_socket(socket, h.dispatcher, h.db, SECRET.into(), Duration::from_millis(300))
        })
    }

    async fn start() -> (SocketAddr, Harness) {
        let harness = Harness {
            dispatcher: Dispatcher::new(),
            db: Database::open_in_memory().unwrap(),
        };
        let app = Router::new()
            .route("/gateway", get(upgrade))
            .with_state(harness.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (addr, harness)
    }

    fn user(db: &Database, role: Role, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let email = format!("{}@example.org", name.to_lowercase());
        db.create_user(id, &email, "not-a-real-hash", name, role).unwrap();
        id
    }

    fn token(user_id: Uuid, role: Role) -> String {
        let claims = Claims {
            sub: user_id,
            email: "someone@example.org".into(),
            role,
            exp: (Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    async fn connect(addr: SocketAddr) -> Client {
        tokio_tungstenite::connect_async(format!("ws://{addr}/gateway"))
            .await
            .unwrap()
            .0
    }

    async fn send(ws: &mut Client, cmd: GatewayCommand) {
        let text = serde_json::to_string(&cmd).unwrap();
        ws.send(tungstenite::Message::text(text)).await.unwrap();
    }

    /// Next event from the server, or `None` once it closes the socket.
    async fn next_event(ws: &mut Client) -> Option<GatewayEvent> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("gateway went quiet");
            match msg {
                Some(Ok(tungstenite::Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
                Some(Ok(tungstenite::Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn identified(addr: SocketAddr, user_id: Uuid, role: Role) -> Client {
        let mut ws = connect(addr).await;
        send(&mut ws, GatewayCommand::Identify { token: token(user_id, role) }).await;
        match next_event(&mut ws).await {
            Some(GatewayEvent::Ready { .. }) => ws,
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    async fn subscribe(ws: &mut Client, id: &str, table: Table, event: EventFilter, filter: Option<RowFilter>) {
        send(ws, GatewayCommand::Subscribe { id: id.into(), table, event, filter }).await;
        match next_event(ws).await {
            Some(GatewayEvent::Subscribed { id: got }) => assert_eq!(got, id),
            other => panic!("expected Subscribed for {id}, got {other:?}"),
        }
    }

    /// Asserts the next event is a change delivered for `subscription` on `table`.
    async fn expect_change(ws: &mut Client, subscription: &str, table: Table) -> serde_json::Value {
        match next_event(ws).await {
            Some(GatewayEvent::Change { subscription: got, table: got_table, record, .. }) => {
                assert_eq!((got.as_str(), got_table), (subscription, table));
                record
            }
            other => panic!("expected a {table:?} change for {subscription}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ready_carries_the_stored_role() {
        let (addr, h) = start().await;
        let id = user(&h.db, Role::Ngo, "Akshaya");

        let mut ws = connect(addr).await;
        // The token is stale about the role; the store wins
        send(&mut ws, GatewayCommand::Identify { token: token(id, Role::Volunteer) }).await;
        match next_event(&mut ws).await {
            Some(GatewayEvent::Ready { user_id, role }) => {
                assert_eq!(user_id, id);
                assert_eq!(role, Role::Ngo);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_or_forged_clients_are_closed() {
        let (addr, h) = start().await;

        let mut silent = connect(addr).await;
        assert!(next_event(&mut silent).await.is_none());

        let mut forged = connect(addr).await;
        send(&mut forged, GatewayCommand::Identify { token: "not-a-jwt".into() }).await;
        assert!(next_event(&mut forged).await.is_none());

        // Valid signature, but the account no longer exists
        let mut ghost = connect(addr).await;
        send(&mut ghost, GatewayCommand::Identify { token: token(Uuid::new_v4(), Role::Donor) }).await;
        assert!(next_event(&mut ghost).await.is_none());

        let id = user(&h.db, Role::Donor, "Meera");
        let mut early = connect(addr).await;
        send(&mut early, GatewayCommand::Unsubscribe { id: "x".into() }).await;
        assert!(next_event(&mut early).await.is_none());
        identified(addr, id, Role::Donor).await;
    }

    #[tokio::test]
    async fn subscriptions_route_changes() {
        let (addr, h) = start().await;
        let donor = user(&h.db, Role::Donor, "Meera");
        let mut ws = identified(addr, donor, Role::Donor).await;
        let publish = |table, kind, record| h.dispatcher.publish(ChangeEvent { table, kind, record });

        subscribe(&mut ws, "all", Table::Donations, EventFilter::All, None).await;
        subscribe(&mut ws, "inserts", Table::Donations, EventFilter::Insert, None).await;

        send(
            &mut ws,
            GatewayCommand::Subscribe {
                id: "chat".into(),
                table: Table::ChatMessages,
                event: EventFilter::All,
                filter: None,
            },
        )
        .await;
        match next_event(&mut ws).await {
            Some(GatewayEvent::SubscriptionRejected { id, reason }) => {
                assert_eq!(id, "chat");
                assert!(reason.contains("task_id"), "{reason}");
            }
            other => panic!("expected a rejection, got {other:?}"),
        }

        // One Change per matching subscription
        publish(Table::Donations, ChangeKind::Insert, json!({ "title": "Rice" }));
        expect_change(&mut ws, "all", Table::Donations).await;
        expect_change(&mut ws, "inserts", Table::Donations).await;

        publish(Table::Donations, ChangeKind::Update, json!({ "title": "Rice" }));
        expect_change(&mut ws, "all", Table::Donations).await;

        // Same id replaces the earlier subscription
        subscribe(&mut ws, "inserts", Table::Wishlists, EventFilter::All, None).await;
        publish(Table::Donations, ChangeKind::Insert, json!({ "title": "Dal" }));
        publish(Table::Wishlists, ChangeKind::Insert, json!({ "item_name": "Oil" }));
        let record = expect_change(&mut ws, "all", Table::Donations).await;
        assert_eq!(record["title"], "Dal");
        expect_change(&mut ws, "inserts", Table::Wishlists).await;

        // Commands are handled in order, so the Subscribed reply proves the unsubscribe landed
        send(&mut ws, GatewayCommand::Unsubscribe { id: "all".into() }).await;
        subscribe(&mut ws, "profiles", Table::Profiles, EventFilter::All, None).await;
        publish(Table::Donations, ChangeKind::Insert, json!({ "title": "Roti" }));
        publish(Table::Wishlists, ChangeKind::Insert, json!({ "item_name": "Salt" }));
        let record = expect_change(&mut ws, "inserts", Table::Wishlists).await;
        assert_eq!(record["item_name"], "Salt");
    }

    #[tokio::test]
    async fn notifications_reach_live_sockets() {
        let (addr, h) = start().await;
        let donor = user(&h.db, Role::Donor, "Meera");
        let mut first = identified(addr, donor, Role::Donor).await;
        let mut second = identified(addr, donor, Role::Donor).await;

        // A command round trip means the connection loop is registered
        subscribe(&mut first, "sync", Table::Profiles, EventFilter::All, None).await;
        subscribe(&mut second, "sync", Table::Profiles, EventFilter::All, None).await;
        assert_eq!(h.dispatcher.connection_count(donor).await, 2);

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: donor,
            kind: "donation_requested".into(),
            title: "Donation requested".into(),
            message: "Akshaya requested \"Rice\"".into(),
            related_id: None,
            is_read: false,
            created_at: Utc::now(),
        };
        h.dispatcher
            .send_to_user(donor, GatewayEvent::Notification(notification.clone()))
            .await;

        for ws in [&mut first, &mut second] {
            match next_event(ws).await {
                Some(GatewayEvent::Notification(got)) => assert_eq!(got, notification),
                other => panic!("expected a notification, got {other:?}"),
            }
        }

        drop(first);
        drop(second);
        for _ in 0..50 {
            if h.dispatcher.connection_count(donor).await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("closed sockets stayed registered");
    }

    #[tokio::test]
    async fn released_volunteer_stops_receiving_chat() {
        let (addr, h) = start().await;
        let db = &h.db;
        let donor = user(db, Role::Donor, "Meera");
        let ngo = user(db, Role::Ngo, "Akshaya");
        let ravi = user(db, Role::Volunteer, "Ravi");
        let sana = user(db, Role::Volunteer, "Sana");

        let now = Utc::now();
        let donation = Donation {
            id: Uuid::new_v4(),
            donor_id: donor,
            title: "Leftover biryani".into(),
            description: None,
            food_type: "cooked".into(),
            quantity: "10 plates".into(),
            estimated_meals: Some(10),
            pickup_address: "12 MG Road".into(),
            pickup_latitude: 12.9716,
            pickup_longitude: 77.5946,
            pickup_instructions: None,
            expiry_time: now + chrono::Duration::hours(6),
            images: vec![],
            status: DonationStatus::Available,
            requested_by: None,
            created_at: now,
            updated_at: now,
        };
        db.create_donation(&donation).unwrap();
        let task = db
            .request_donation(donation.id, ngo, Uuid::new_v4(), now)
            .unwrap()
            .applied()
            .unwrap()
            .task;
        db.advance_task(task.id, TaskAction::Accept, ravi, now).unwrap();

        let mut ws = identified(addr, ravi, Role::Volunteer).await;
        let chat_filter = RowFilter::equals("task_id", task.id);
        subscribe(&mut ws, "chat", Table::ChatMessages, EventFilter::All, Some(chat_filter)).await;
        subscribe(&mut ws, "board", Table::VolunteerTasks, EventFilter::All, None).await;
        subscribe(&mut ws, "donations", Table::Donations, EventFilter::All, None).await;

        let publish = |table, kind, record| h.dispatcher.publish(ChangeEvent { table, kind, record });
        let chat = |text: &str| json!({ "task_id": task.id, "message": text });

        publish(Table::ChatMessages, ChangeKind::Insert, chat("On my way"));
        expect_change(&mut ws, "chat", Table::ChatMessages).await;

        let released = db
            .advance_task(task.id, TaskAction::Release, ravi, Utc::now())
            .unwrap()
            .applied()
            .unwrap()
            .task;
        h.dispatcher.publish(ChangeEvent::new(Table::VolunteerTasks, ChangeKind::Update, &released));
        match next_event(&mut ws).await {
            Some(GatewayEvent::SubscriptionRejected { id, .. }) => assert_eq!(id, "chat"),
            other => panic!("expected the chat subscription to be dropped, got {other:?}"),
        }
        expect_change(&mut ws, "board", Table::VolunteerTasks).await;

        let taken = db
            .advance_task(task.id, TaskAction::Accept, sana, Utc::now())
            .unwrap()
            .applied()
            .unwrap()
            .task;
        h.dispatcher.publish(ChangeEvent::new(Table::VolunteerTasks, ChangeKind::Update, &taken));
        expect_change(&mut ws, "board", Table::VolunteerTasks).await;

        // The next volunteer's conversation is not forwarded
        publish(Table::ChatMessages, ChangeKind::Insert, chat("Sana, the gate code is 42"));
        publish(Table::Donations, ChangeKind::Update, json!({ "id": donation.id }));
        expect_change(&mut ws, "donations", Table::Donations).await;
    }
}
