//! OSC over UDP into an [`EventRouter`].

use std::sync::Arc;

use anyhow::{Context, Result};
use oscsig_core::{Event, EventRouter};
use rosc::{OscPacket, OscType, decoder};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65_536;

/// Flatten a packet into events, one per message, bundles in order.
///
/// Numeric and boolean arguments become values; strings, blobs and the
/// other OSC types are dropped. A message without numeric arguments still
/// yields an event, which only marks its node as active.
pub fn packet_events(packet: OscPacket) -> Vec<Event> {
    let mut events = Vec::new();
    collect(packet, &mut events);
    events
}

fn collect(packet: OscPacket, events: &mut Vec<Event>) {
    match packet {
        OscPacket::Message(msg) => {
            let values = msg.args.iter().filter_map(numeric).collect();
            events.push(Event::new(msg.addr, values));
        }
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                collect(inner, events);
            }
        }
    }
}

fn numeric(arg: &OscType) -> Option<f64> {
    match *arg {
        OscType::Float(v) => Some(f64::from(v)),
        OscType::Double(v) => Some(v),
        OscType::Int(v) => Some(f64::from(v)),
        OscType::Long(v) => Some(v as f64),
        OscType::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub async fn bind(addr: &str) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind UDP socket on {addr}"))?;
    if let Ok(local) = socket.local_addr() {
        tracing::info!("listening for OSC on {local}");
    }
    Ok(socket)
}

/// Route every datagram received on `socket` until `token` is cancelled.
///
/// Malformed packets are logged and dropped. Returns the number of events
/// routed.
pub async fn receive(
    socket: UdpSocket,
    router: Arc<EventRouter>,
    token: CancellationToken,
) -> usize {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut routed = 0;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => match decoder::decode_udp(&buf[..len]) {
                    Ok((_, packet)) => {
                        for event in packet_events(packet) {
                            if !router.route_event(&event) {
                                tracing::warn!(
                                    "ignoring non-finite values for {} from {from}",
                                    event.address
                                );
                            }
                            routed += 1;
                        }
                    }
                    Err(e) => tracing::warn!("dropping malformed OSC packet from {from}: {e:?}"),
                },
                Err(e) => tracing::warn!("UDP receive failed: {e}"),
            }
        }
    }
    tracing::debug!("OSC receiver stopped after {routed} events");
    routed
}
