// MQTT transport - feeds broker traffic into the live feed channel
use crate::application::live_feed::FeedEvent;
use crate::domain::connection::LinkEvent;
use crate::infrastructure::config::BrokerSettings;
use bytes::Bytes;
use chrono::Local;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeReasonCode, Transport};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const REQUEST_CHANNEL_CAPACITY: usize = 10;
const DISCONNECT_FLUSH: Duration = Duration::from_secs(1);

pub struct MqttTransport {
    options: MqttOptions,
    topic: String,
    reconnect_interval: Duration,
}

#[derive(Debug, PartialEq)]
enum Inbound {
    Connected,
    Subscribed,
    /// The broker refused the topic filter.
    SubscribeRejected,
    Message(Bytes),
    Ignored,
}

fn inspect(event: Event) -> Inbound {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Inbound::Connected,
        Event::Incoming(Packet::SubAck(suback)) => {
            if suback
                .return_codes
                .iter()
                .any(|code| matches!(code, SubscribeReasonCode::Failure))
            {
                Inbound::SubscribeRejected
            } else {
                Inbound::Subscribed
            }
        }
        Event::Incoming(Packet::Publish(publish)) => Inbound::Message(publish.payload),
        _ => Inbound::Ignored,
    }
}

impl MqttTransport {
    pub fn new(settings: &BrokerSettings) -> Self {
        let client_id = format!("{}-{}", settings.client_id_prefix, std::process::id());
        let mut options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
        options.set_keep_alive(settings.keepalive());
        options.set_clean_session(true);

        if !settings.username.is_empty() {
            options.set_credentials(settings.username.clone(), settings.password.clone());
        }
        if settings.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        Self {
            options,
            topic: settings.topic.clone(),
            reconnect_interval: settings.reconnect_interval(),
        }
    }

    /// Run until `shutdown` flips or the consumer goes away. Connection errors
    /// are retried forever after the fixed reconnect interval.
    pub async fn run(self, tx: mpsc::Sender<FeedEvent>, mut shutdown: watch::Receiver<bool>) {
        let (host, port) = self.options.broker_address();
        tracing::info!("Connecting to MQTT broker {}:{} for topic {}", host, port, self.topic);

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CHANNEL_CAPACITY);
        let mut open = forward(&tx, FeedEvent::Link(LinkEvent::Dialing)).await;

        while open {
            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                polled = eventloop.poll() => polled,
            };

            open = match polled {
                Ok(event) => match inspect(event) {
                    Inbound::Connected => {
                        // Clean sessions drop subscriptions, so subscribe on every ConnAck
                        tracing::info!("Connected to broker, subscribing to {}", self.topic);
                        if let Err(e) = client.try_subscribe(self.topic.clone(), QoS::AtMostOnce) {
                            tracing::error!("Failed to queue subscription: {}", e);
                        }
                        true
                    }
                    Inbound::Subscribed => forward(&tx, FeedEvent::Link(LinkEvent::Subscribed)).await,
                    Inbound::SubscribeRejected => {
                        tracing::error!(
                            "Broker rejected subscription to {}; retrying in {:?}",
                            self.topic,
                            self.reconnect_interval
                        );
                        let resumed = self.back_off(&tx, &mut shutdown).await;
                        if resumed {
                            if let Err(e) = client.try_subscribe(self.topic.clone(), QoS::AtMostOnce) {
                                tracing::error!("Failed to queue subscription: {}", e);
                            }
                        }
                        resumed
                    }
                    Inbound::Message(payload) => {
                        let event = FeedEvent::Message {
                            payload,
                            received_at: Local::now(),
                        };
                        forward(&tx, event).await
                    }
                    Inbound::Ignored => true,
                },
                Err(e) => {
                    tracing::warn!(
                        "Broker connection error: {}; retrying in {:?}",
                        e,
                        self.reconnect_interval
                    );
                    self.back_off(&tx, &mut shutdown).await
                }
            };
        }

        if client.try_disconnect().is_ok() {
            // Give the event loop a chance to put DISCONNECT on the wire
            let _ = tokio::time::timeout(DISCONNECT_FLUSH, eventloop.poll()).await;
        }
        let _ = tx.send(FeedEvent::Link(LinkEvent::Shutdown)).await;
        tracing::info!("MQTT transport stopped");
    }
}

impl MqttTransport {
    /// Report the link as lost, wait out the reconnect interval and report a
    /// new attempt. False when the loop should stop instead.
    async fn back_off(&self, tx: &mpsc::Sender<FeedEvent>, shutdown: &mut watch::Receiver<bool>) -> bool {
        if !forward(tx, FeedEvent::Link(LinkEvent::Lost)).await {
            return false;
        }
        tokio::select! {
            _ = shutdown.changed() => return false,
            _ = tokio::time::sleep(self.reconnect_interval) => {}
        }
        forward(tx, FeedEvent::Link(LinkEvent::Dialing)).await
    }
}

/// False once the consumer has hung up.
async fn forward(tx: &mpsc::Sender<FeedEvent>, event: FeedEvent) -> bool {
    if tx.send(event).await.is_err() {
        tracing::debug!("Live feed consumer closed; stopping transport");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Outgoing, Publish, SubAck, SubscribeReasonCode};

    fn settings() -> BrokerSettings {
        BrokerSettings {
            host: "broker.example.org".to_string(),
            port: 8883,
            topic: "lab/dht".to_string(),
            tls: false,
            keepalive_secs: 60,
            reconnect_interval_ms: 2000,
            client_id_prefix: "dash".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }

    #[test]
    fn test_options_from_settings() {
        let transport = MqttTransport::new(&settings());

        assert_eq!(
            transport.options.broker_address(),
            ("broker.example.org".to_string(), 8883)
        );
        assert_eq!(transport.options.keep_alive(), Duration::from_secs(60));
        assert!(transport.options.client_id().starts_with("dash-"));
        assert!(transport.options.clean_session());
        assert_eq!(transport.reconnect_interval, Duration::from_millis(2000));
        assert_eq!(transport.topic, "lab/dht");
    }

    #[test]
    fn test_inspect_events() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(inspect(connack), Inbound::Connected);

        let suback = Event::Incoming(Packet::SubAck(SubAck::new(
            1,
            vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
        )));
        assert_eq!(inspect(suback), Inbound::Subscribed);

        let rejected = Event::Incoming(Packet::SubAck(SubAck::new(1, vec![SubscribeReasonCode::Failure])));
        assert_eq!(inspect(rejected), Inbound::SubscribeRejected);

        let partly_rejected = Event::Incoming(Packet::SubAck(SubAck::new(
            2,
            vec![SubscribeReasonCode::Success(QoS::AtMostOnce), SubscribeReasonCode::Failure],
        )));
        assert_eq!(inspect(partly_rejected), Inbound::SubscribeRejected);

        let publish = Event::Incoming(Packet::Publish(Publish::new(
            "lab/dht",
            QoS::AtMostOnce,
            r#"{"temperature": 24.0, "humidity": 55.0}"#,
        )));
        assert_eq!(
            inspect(publish),
            Inbound::Message(Bytes::from_static(br#"{"temperature": 24.0, "humidity": 55.0}"#))
        );

        assert_eq!(inspect(Event::Outgoing(Outgoing::PingReq)), Inbound::Ignored);
        assert_eq!(inspect(Event::Incoming(Packet::PingResp)), Inbound::Ignored);
    }

    /// Minimal broker: accepts the connection and refuses every subscription.
    async fn refusing_broker(listener: tokio::net::TcpListener, subscribes: mpsc::UnboundedSender<u16>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 512];
        loop {
            let n = match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            let reply: Vec<u8> = match buf[0] {
                // CONNECT -> CONNACK accepted
                0x10 => vec![0x20, 0x02, 0x00, 0x00],
                // SUBSCRIBE -> SUBACK failure for the same packet id
                0x82 if n >= 4 => {
                    let _ = subscribes.send(u16::from_be_bytes([buf[2], buf[3]]));
                    vec![0x90, 0x03, buf[2], buf[3], 0x80]
                }
                _ => continue,
            };
            if socket.write_all(&reply).await.is_err() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_subscription_backs_off_and_resubscribes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (subscribes_tx, mut subscribes_rx) = mpsc::unbounded_channel();
        tokio::spawn(refusing_broker(listener, subscribes_tx));

        let mut config = settings();
        config.host = "127.0.0.1".to_string();
        config.port = port;
        config.reconnect_interval_ms = 50;

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(MqttTransport::new(&config).run(tx, shutdown_rx));

        let mut links = Vec::new();
        while links.len() < 5 {
            if let Some(FeedEvent::Link(event)) = rx.recv().await {
                links.push(event);
            }
        }
        assert_eq!(
            links,
            vec![
                LinkEvent::Dialing,
                LinkEvent::Lost,
                LinkEvent::Dialing,
                LinkEvent::Lost,
                LinkEvent::Dialing,
            ]
        );
        // Subscribed was never reported, and the topic was requested again
        assert!(subscribes_rx.recv().await.is_some());
        assert!(subscribes_rx.recv().await.is_some());

        shutdown_tx.send(true).unwrap();
        while rx.recv().await.is_some() {}
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_broker_reports_lost_then_shuts_down() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = settings();
        config.host = "127.0.0.1".to_string();
        config.port = port;
        config.reconnect_interval_ms = 50;

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(MqttTransport::new(&config).run(tx, shutdown_rx));

        let mut links = Vec::new();
        while links.len() < 3 {
            if let Some(FeedEvent::Link(event)) = rx.recv().await {
                links.push(event);
            }
        }
        assert_eq!(links, vec![LinkEvent::Dialing, LinkEvent::Lost, LinkEvent::Dialing]);

        shutdown_tx.send(true).unwrap();

        // Drain until the transport drops its sender
        let mut last = None;
        while let Some(event) = rx.recv().await {
            if let FeedEvent::Link(link) = event {
                last = Some(link);
            }
        }
        task.await.unwrap();
        assert_eq!(last, Some(LinkEvent::Shutdown));
    }
}
