use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow};
use log::info;
use rosc::{OscMessage, OscPacket, OscType, encoder};
use tokio::net::UdpSocket;

use super::EventSink;
use crate::config::OscConfig;

/// Sends OSC 1.0 messages over UDP
pub struct OscTransmitter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscTransmitter {
    pub async fn bind(local: SocketAddr, target: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .with_context(|| format!("Failed to bind OSC socket on {}", local))?;
        info!(
            "OSC transmitter bound to {}, sending to {}",
            socket.local_addr()?,
            target
        );
        Ok(Self { socket, target })
    }

    pub async fn from_config(config: &OscConfig) -> Result<Self> {
        Self::bind(config.bind_socket_addr()?, config.target_socket_addr()?).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Encodes a single-integer OSC message
pub fn encode_int(address: &str, value: i32) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: vec![OscType::Int(value)],
    });
    encoder::encode(&packet).map_err(|e| anyhow!("Failed to encode OSC message {}: {:?}", address, e))
}

impl EventSink for OscTransmitter {
    fn send_int(&mut self, address: &str, value: i32) -> Result<()> {
        let packet = encode_int(address, value)?;
        self.socket
            .try_send_to(&packet, self.target)
            .with_context(|| format!("Failed to send {} to {}", address, self.target))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::decoder;

    #[test]
    fn encodes_address_and_int_argument() {
        let bytes = encode_int("/input/Jump", 1).unwrap();
        let (_, packet) = decoder::decode_udp(&bytes).unwrap();

        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, "/input/Jump");
                assert_eq!(msg.args, vec![OscType::Int(1)]);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn delivers_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();
        let mut transmitter = OscTransmitter::bind("127.0.0.1:0".parse().unwrap(), target)
            .await
            .unwrap();

        transmitter.send_int("/input/Jump", 0).unwrap();

        let mut buf = [0u8; 1536];
        let (len, from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, transmitter.local_addr().unwrap());

        let (_, packet) = decoder::decode_udp(&buf[..len]).unwrap();
        let OscPacket::Message(msg) = packet else {
            panic!("expected a message");
        };
        assert_eq!(msg.addr, "/input/Jump");
        assert_eq!(msg.args, vec![OscType::Int(0)]);
    }
}
