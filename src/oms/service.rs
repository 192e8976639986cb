//! `OmsService::run` — the single task that owns the order book and the
//! per-account rules cache. External mutation only happens by message
//! passing over the three inbound subjects; no cross-task locking is
//! needed because nothing outside this task ever touches `orders` or
//! `rules` directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::broker::{callback, Client, Message};
use crate::config::Config;
use crate::domain::order::Order;
use crate::domain::validation::{validate, ValidationRules};
use crate::error::ConnectionError;
use crate::events::{EventEnvelope, EventPayload};
use crate::ids::OrderId;
use crate::statemachine::{transition, Effect, Event};

use super::inbound::{CancelRequest, FillRequest, NewOrderRequest};

/// An inbound request, already deserialized, forwarded from a subscription
/// callback onto the service's single-owner dispatch channel.
enum Inbound {
    New(NewOrderRequest),
    Fill(FillRequest),
    Cancel(CancelRequest),
}

#[derive(Debug, Default)]
struct Stats {
    fills_processed: u64,
    daily_volume: f64,
    rejections: u64,
    errors: u64,
}

pub struct OmsService {
    client: Arc<Client>,
    config: Config,
    orders: HashMap<OrderId, Order>,
    rules: HashMap<String, ValidationRules>,
    inbound_rx: tokio::sync::mpsc::Receiver<Inbound>,
    started_at: Instant,
    stats: Stats,
}

impl OmsService {
    /// Open a connection, subscribe to `orders.new`/`orders.fill`/
    /// `orders.cancel`, and return a service ready to `run()`.
    pub async fn connect(config: Config) -> Result<Self, ConnectionError> {
        let client = Arc::new(Client::connect(&config).await?);
        let (tx, rx) = tokio::sync::mpsc::channel::<Inbound>(1024);

        let new_tx = tx.clone();
        client
            .subscribe(
                "orders.new",
                callback(move |msg: Message| {
                    let new_tx = new_tx.clone();
                    async move {
                        match serde_json::from_slice::<NewOrderRequest>(&msg.payload) {
                            Ok(req) => {
                                let _ = new_tx.send(Inbound::New(req)).await;
                            }
                            Err(e) => warn!(error = %e, "dropping malformed orders.new payload"),
                        }
                    }
                }),
            )
            .await?;

        let fill_tx = tx.clone();
        client
            .subscribe(
                "orders.fill",
                callback(move |msg: Message| {
                    let fill_tx = fill_tx.clone();
                    async move {
                        match serde_json::from_slice::<FillRequest>(&msg.payload) {
                            Ok(req) => {
                                let _ = fill_tx.send(Inbound::Fill(req)).await;
                            }
                            Err(e) => warn!(error = %e, "dropping malformed orders.fill payload"),
                        }
                    }
                }),
            )
            .await?;

        let cancel_tx = tx.clone();
        client
            .subscribe(
                "orders.cancel",
                callback(move |msg: Message| {
                    let cancel_tx = cancel_tx.clone();
                    async move {
                        match serde_json::from_slice::<CancelRequest>(&msg.payload) {
                            Ok(req) => {
                                let _ = cancel_tx.send(Inbound::Cancel(req)).await;
                            }
                            Err(e) => warn!(error = %e, "dropping malformed orders.cancel payload"),
                        }
                    }
                }),
            )
            .await?;

        Ok(Self {
            client,
            config,
            orders: HashMap::new(),
            rules: HashMap::new(),
            inbound_rx: rx,
            started_at: Instant::now(),
            stats: Stats::default(),
        })
    }

    /// Drive the service until the inbound channel closes (every
    /// subscription task has terminated, i.e. the connection closed) or
    /// the caller's shutdown signal fires. Emits a heartbeat on
    /// `system.heartbeat.oms` at `config.heartbeat_interval`.
    pub async fn run(mut self) {
        info!(addr = %self.config.addr(), "OMS service started");
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);

        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => {
                    match msg {
                        Some(Inbound::New(req)) => self.handle_new_order(req).await,
                        Some(Inbound::Fill(req)) => self.handle_fill(req).await,
                        Some(Inbound::Cancel(req)) => self.handle_cancel(req).await,
                        None => {
                            warn!("inbound channel closed, stopping OMS service");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    self.publish_heartbeat().await;
                }
            }
        }

        info!(
            fills = self.stats.fills_processed,
            rejections = self.stats.rejections,
            errors = self.stats.errors,
            "OMS service stopped"
        );
    }

    async fn handle_new_order(&mut self, req: NewOrderRequest) {
        let rules = self
            .rules
            .entry(req.account_id.clone())
            .or_insert_with(ValidationRules::default)
            .clone();

        let now = Utc::now();
        let id = req.order.id.clone().unwrap_or_else(OrderId::generate);
        let order = Order::new(
            id.clone(),
            req.order.client_id,
            req.order.instrument_id.clone(),
            req.order.side,
            req.order.order_type,
            req.order.quantity,
            now,
        );

        match validate(&order, &rules) {
            Ok(()) => {
                let payload = EventPayload::OrderSubmitted {
                    order_id: id.clone(),
                    instrument: req.order.instrument_id,
                    quantity: req.order.quantity,
                    timestamp: now,
                };
                self.orders.insert(id, order);
                self.publish(payload).await;
            }
            Err(e) => {
                self.stats.rejections += 1;
                let mut rejected = order;
                rejected.status = crate::domain::order::OrderStatus::Rejected {
                    reason: e.to_string(),
                };
                self.orders.insert(id.clone(), rejected);
                self.publish(EventPayload::OrderRejected {
                    order_id: id,
                    reason: e.to_string(),
                    timestamp: now,
                })
                .await;
            }
        }
    }

    async fn handle_fill(&mut self, req: FillRequest) {
        let Some(order) = self.orders.get(&req.order_id) else {
            self.stats.errors += 1;
            self.publish_error(req.order_id, "not_found").await;
            return;
        };

        let now = Utc::now();
        match transition(
            order,
            Event::Fill {
                qty: req.fill_qty,
                price: req.fill_price,
                at: now,
            },
        ) {
            Ok((new_order, effects)) => {
                self.orders.insert(req.order_id, new_order);
                self.stats.fills_processed += 1;
                self.stats.daily_volume += req.fill_qty;
                self.publish_effects(effects).await;
            }
            Err(e) => {
                self.stats.errors += 1;
                self.publish_error(req.order_id, &e.to_string()).await;
            }
        }
    }

    async fn handle_cancel(&mut self, req: CancelRequest) {
        let Some(order) = self.orders.get(&req.order_id) else {
            self.stats.errors += 1;
            self.publish_error(req.order_id, "not_found").await;
            return;
        };

        let now = Utc::now();
        match transition(order, Event::Cancel { at: now }) {
            Ok((new_order, effects)) => {
                self.orders.insert(req.order_id, new_order);
                self.publish_effects(effects).await;
            }
            Err(e) => {
                self.stats.errors += 1;
                self.publish_error(req.order_id, &e.to_string()).await;
            }
        }
    }

    async fn publish_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            let Effect::Publish(payload) = effect;
            self.publish(payload).await;
        }
    }

    async fn publish_error(&self, order_id: OrderId, reason: &str) {
        self.publish(EventPayload::OrderNotFound {
            order_id,
            reason: reason.to_string(),
        })
        .await;
    }

    /// Publish `payload` on its primary subject, plus any mirror subjects
    /// (e.g. `RiskCheckResult` also broadcasts on `risk.events`) — each
    /// mirror gets its own envelope with the mirror's subject so a
    /// subscriber reading raw frames always sees a matching `subject`
    /// field rather than the primary one.
    async fn publish(&self, payload: EventPayload) {
        let mirrors = crate::events::mirror_subjects_for(&payload);
        let envelope = EventEnvelope::new(payload, Utc::now());
        self.publish_envelope(&envelope).await;
        for subject in mirrors {
            let mut mirrored = envelope.clone();
            mirrored.subject = subject;
            self.publish_envelope(&mirrored).await;
        }
    }

    async fn publish_envelope(&self, envelope: &EventEnvelope) {
        match serde_json::to_vec(envelope) {
            Ok(bytes) => {
                if let Err(e) = self.client.publish(&envelope.subject, None, &bytes).await {
                    warn!(error = %e, subject = %envelope.subject, "failed to publish event");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize event envelope"),
        }
    }

    /// Active-order count, cumulative fill volume, and process uptime,
    /// published on `system.heartbeat.oms`.
    async fn publish_heartbeat(&self) {
        let active_orders = self
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .count();
        let body = serde_json::json!({
            "active_orders": active_orders,
            "daily_volume": self.stats.daily_volume,
            "uptime_secs": self.started_at.elapsed().as_secs_f64(),
            "fills_processed": self.stats.fills_processed,
            "rejections": self.stats.rejections,
            "errors": self.stats.errors,
        });
        match serde_json::to_vec(&body) {
            Ok(bytes) => {
                if let Err(e) = self
                    .client
                    .publish("system.heartbeat.oms", None, &bytes)
                    .await
                {
                    warn!(error = %e, "failed to publish heartbeat");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize heartbeat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// A mock broker that records every frame the service under test
    /// publishes and lets the test inject `MSG` frames as if an external
    /// producer published on `orders.new`/`orders.fill`/`orders.cancel` —
    /// the server-side counterpart of the harness in
    /// `broker::client::tests::spawn_mock_server`, extended with an inject
    /// channel so the test can drive the service's subscriptions directly.
    struct MockBroker {
        config: Config,
        captured: Arc<tokio::sync::Mutex<Vec<(String, Vec<u8>)>>>,
        inject_tx: mpsc::UnboundedSender<(String, Vec<u8>)>,
        _server: tokio::task::JoinHandle<()>,
    }

    async fn spawn_mock_broker() -> MockBroker {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let captured = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let captured_task = captured.clone();
        let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<(String, Vec<u8>)>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            let info = r#"{"server_id":"s1","version":"2.10","proto":1,"host":"h","port":4222,"max_payload":1048576}"#;
            write_half
                .write_all(format!("INFO {info}\r\n").as_bytes())
                .await
                .unwrap();
            let mut connect_line = String::new();
            reader.read_line(&mut connect_line).await.unwrap();
            write_half.write_all(b"+OK\r\n").await.unwrap();

            let mut subs: StdHashMap<String, u64> = StdHashMap::new();

            loop {
                tokio::select! {
                    line = read_control_line(&mut reader) => {
                        let Some(line) = line else { break };
                        if let Some(rest) = line.strip_prefix("SUB ") {
                            let tokens: Vec<&str> = rest.trim().split_whitespace().collect();
                            let subject = tokens[0].to_string();
                            let sid: u64 = tokens.last().unwrap().parse().unwrap();
                            subs.insert(subject, sid);
                        } else if let Some(rest) = line.strip_prefix("PUB ") {
                            let tokens: Vec<&str> = rest.trim().split_whitespace().collect();
                            let (subject, size) = match tokens.as_slice() {
                                [subject, size] => (subject.to_string(), size.parse::<usize>().unwrap()),
                                [subject, _reply, size] => {
                                    (subject.to_string(), size.parse::<usize>().unwrap())
                                }
                                _ => panic!("bad PUB line: {line:?}"),
                            };
                            let mut payload = vec![0u8; size];
                            reader.read_exact(&mut payload).await.unwrap();
                            let mut crlf = [0u8; 2];
                            reader.read_exact(&mut crlf).await.unwrap();
                            captured_task.lock().await.push((subject, payload));
                        } else if line.starts_with("UNSUB") || line.starts_with("PING") {
                            // not exercised by these scenarios
                        }
                    }
                    injected = inject_rx.recv() => {
                        let Some((subject, payload)) = injected else { break };
                        if let Some(sid) = subs.get(&subject) {
                            let header = format!("MSG {subject} {sid} {}\r\n", payload.len());
                            write_half.write_all(header.as_bytes()).await.unwrap();
                            write_half.write_all(&payload).await.unwrap();
                            write_half.write_all(b"\r\n").await.unwrap();
                        }
                    }
                }
            }
        });

        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = port;
        config.heartbeat_interval = Duration::from_secs(3600);

        MockBroker {
            config,
            captured,
            inject_tx,
            _server: server,
        }
    }

    async fn read_control_line(
        reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    ) -> Option<String> {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.ok()?;
        if n == 0 {
            None
        } else {
            Some(line)
        }
    }

    async fn wait_for_subject(
        captured: &Arc<tokio::sync::Mutex<Vec<(String, Vec<u8>)>>>,
        subject: &str,
        timeout: Duration,
    ) -> serde_json::Value {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let guard = captured.lock().await;
                if let Some((_, payload)) = guard.iter().find(|(s, _)| s == subject) {
                    return serde_json::from_slice(payload).unwrap();
                }
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for a publish on {subject}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn s5_order_happy_path_partial_then_full_fill() {
        let broker = spawn_mock_broker().await;
        let service = OmsService::connect(broker.config.clone()).await.unwrap();
        tokio::spawn(service.run());
        // give subscriptions time to register on the mock server
        tokio::time::sleep(Duration::from_millis(50)).await;

        let order_id = "order-1";
        let new_order = serde_json::json!({
            "order": {
                "id": order_id,
                "client_id": "c1",
                "instrument_id": "AAPL",
                "side": "buy",
                "order_type": { "type": "limit", "price": 150.0 },
                "quantity": 100.0
            },
            "account_id": "acct-1"
        });
        broker
            .inject_tx
            .send((
                "orders.new".to_string(),
                serde_json::to_vec(&new_order).unwrap(),
            ))
            .unwrap();

        let accepted = wait_for_subject(&broker.captured, "orders.accepted", Duration::from_secs(2)).await;
        assert_eq!(accepted["payload"]["order_id"], order_id);

        let fill1 = serde_json::json!({"order_id": order_id, "fill_qty": 40.0, "fill_price": 149.5});
        broker
            .inject_tx
            .send(("orders.fill".to_string(), serde_json::to_vec(&fill1).unwrap()))
            .unwrap();

        let filled1 = wait_for_subject(&broker.captured, "orders.filled", Duration::from_secs(2)).await;
        assert_eq!(filled1["payload"]["fill_qty"], 40.0);
        let _ = wait_for_subject(&broker.captured, "positions.update", Duration::from_secs(2)).await;

        let fill2 = serde_json::json!({"order_id": order_id, "fill_qty": 60.0, "fill_price": 149.7});
        broker
            .inject_tx
            .send(("orders.fill".to_string(), serde_json::to_vec(&fill2).unwrap()))
            .unwrap();

        // second fill publishes another orders.filled frame; wait until two exist.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let count = broker
                .captured
                .lock()
                .await
                .iter()
                .filter(|(s, _)| s == "orders.filled")
                .count();
            if count >= 2 {
                break;
            }
            assert!(Instant::now() < deadline, "second fill was never published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn s6_cancel_races_fill_produces_an_error_event() {
        let broker = spawn_mock_broker().await;
        let service = OmsService::connect(broker.config.clone()).await.unwrap();
        tokio::spawn(service.run());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let order_id = "order-2";
        let new_order = serde_json::json!({
            "order": {
                "id": order_id,
                "client_id": "c1",
                "instrument_id": "AAPL",
                "side": "buy",
                "order_type": { "type": "limit", "price": 150.0 },
                "quantity": 100.0
            },
            "account_id": "acct-1"
        });
        broker
            .inject_tx
            .send(("orders.new".to_string(), serde_json::to_vec(&new_order).unwrap()))
            .unwrap();
        let _ = wait_for_subject(&broker.captured, "orders.accepted", Duration::from_secs(2)).await;

        let fill = serde_json::json!({"order_id": order_id, "fill_qty": 30.0, "fill_price": 149.0});
        broker
            .inject_tx
            .send(("orders.fill".to_string(), serde_json::to_vec(&fill).unwrap()))
            .unwrap();
        let _ = wait_for_subject(&broker.captured, "orders.filled", Duration::from_secs(2)).await;

        let cancel = serde_json::json!({"order_id": order_id});
        broker
            .inject_tx
            .send(("orders.cancel".to_string(), serde_json::to_vec(&cancel).unwrap()))
            .unwrap();
        let _ = wait_for_subject(&broker.captured, "orders.cancelled", Duration::from_secs(2)).await;

        // A fill for the now-cancelled order must be rejected as an error,
        // not silently accepted as another orders.filled frame.
        let late_fill = serde_json::json!({"order_id": order_id, "fill_qty": 10.0, "fill_price": 149.0});
        broker
            .inject_tx
            .send((
                "orders.fill".to_string(),
                serde_json::to_vec(&late_fill).unwrap(),
            ))
            .unwrap();
        let error_event = wait_for_subject(&broker.captured, "orders.errors", Duration::from_secs(2)).await;
        assert_eq!(error_event["payload"]["order_id"], order_id);

        let fill_count = broker
            .captured
            .lock()
            .await
            .iter()
            .filter(|(s, _)| s == "orders.filled")
            .count();
        assert_eq!(fill_count, 1, "the cancelled order must not accept the late fill");
    }
}
