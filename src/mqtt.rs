use crate::config::MqttConfig;
use crate::dispatch::{Dispatcher, MetadataEvent, KNOWN_SUBTOPICS};
use anyhow::Context;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Connect to the broker and pump its event loop into the dispatcher.
///
/// Subscriptions happen on every CONNACK, so a broker reconnect
/// re-establishes them without touching the display state. A failure before
/// the first successful connect is fatal; after that, errors are logged and
/// the loop keeps retrying.
pub fn run(settings: &MqttConfig, dispatcher: &Dispatcher) -> anyhow::Result<()> {
    let options = client_options(settings)?;
    let (client, mut connection) = Client::new(options, 64);

    let mut connected_once = false;
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(
                    "connected to broker {}:{}, topic root '{}'",
                    settings.host, settings.port, settings.topic
                );
                connected_once = true;
                subscribe_all(&client, &settings.topic)?;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let event = MetadataEvent::from_topic(
                    &settings.topic,
                    &publish.topic,
                    publish.payload.to_vec(),
                );
                dispatcher.handle(event);
            }
            Ok(_) => {}
            Err(e) if !connected_once => {
                return Err(anyhow::Error::new(e).context(format!(
                    "could not connect to broker {}:{}",
                    settings.host, settings.port
                )));
            }
            Err(e) => {
                error!("broker connection lost: {e}; retrying");
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
    Ok(())
}

fn client_options(settings: &MqttConfig) -> anyhow::Result<MqttOptions> {
    let client_id = format!("matrix-bridge-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, &settings.host, settings.port);
    options.set_keep_alive(Duration::from_secs(30));

    if let Some(username) = &settings.username {
        options.set_credentials(
            username.as_str(),
            settings.password.clone().unwrap_or_default(),
        );
    }

    if let Some(tls) = &settings.tls {
        let ca = std::fs::read(&tls.ca_certs_path)
            .with_context(|| format!("reading CA bundle {}", tls.ca_certs_path))?;
        let client_auth = match (&tls.certfile_path, &tls.keyfile_path) {
            (Some(cert), Some(key)) => Some((
                std::fs::read(cert).with_context(|| format!("reading client cert {cert}"))?,
                std::fs::read(key).with_context(|| format!("reading client key {key}"))?,
            )),
            _ => None,
        };
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }));
    }

    Ok(options)
}

fn subscribe_all(client: &Client, topic_root: &str) -> anyhow::Result<()> {
    for subtopic in KNOWN_SUBTOPICS {
        let topic = format!("{topic_root}/{subtopic}");
        client
            .subscribe(topic.as_str(), QoS::AtMostOnce)
            .with_context(|| format!("subscribing to {topic}"))?;
        debug!("subscribed to {topic}");
    }
    Ok(())
}
