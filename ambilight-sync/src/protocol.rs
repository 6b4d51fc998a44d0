// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! DRGB realtime protocol
//!
//! One datagram per frame, no acknowledgement:
//!
//! ```text
//! +------+---------+-----+-----+-----+-----+-----+-----+-----
//! | 0x02 | timeout | B0  | G0  | R0  | B1  | G1  | R1  | ...
//! +------+---------+-----+-----+-----+-----+-----+-----+-----
//! ```
//!
//! `timeout` is the number of seconds the device keeps showing the frame
//! before returning to its own effects when no further frame arrives.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use log::trace;

use crate::error::{Result, SyncError};
use crate::frame::Rgb;

/// Protocol selector byte for DRGB
pub const DRGB_PROTOCOL: u8 = 2;

/// Seconds the device holds the last frame
pub const DEFAULT_TIMEOUT_SECS: u8 = 2;

/// Header length in bytes
pub const HEADER_LEN: usize = 2;

/// Bytes per LED
pub const BYTES_PER_LED: usize = 3;

/// Default realtime UDP port of the lighting device
pub const DEFAULT_PORT: u16 = 21324;

/// Size of the datagram carrying `num_leds` colors
pub fn packet_len(num_leds: usize) -> usize {
    HEADER_LEN + BYTES_PER_LED * num_leds
}

/// Serialize an LED buffer into a DRGB datagram.
///
/// Channels go on the wire as (B, G, R).
pub fn encode_drgb(leds: &[Rgb], timeout_secs: u8) -> Vec<u8> {
    let mut packet = Vec::with_capacity(packet_len(leds.len()));
    packet.push(DRGB_PROTOCOL);
    packet.push(timeout_secs);
    for led in leds {
        packet.extend_from_slice(&[led.b, led.g, led.r]);
    }
    packet
}

/// Delivers encoded frames to the lighting device
pub trait Transmitter: Send {
    /// Send one encoded frame. Never retried.
    fn transmit(&mut self, packet: &[u8]) -> Result<()>;
}

/// Connectionless UDP transmitter.
///
/// A socket is bound, used and dropped on every call; nothing is kept
/// between frames.
#[derive(Debug, Clone)]
pub struct UdpTransmitter {
    host: String,
    port: u16,
}

impl UdpTransmitter {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
            })
    }

    fn send(&self, packet: &[u8]) -> io::Result<usize> {
        let target = self.resolve()?;
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.send_to(packet, target)
    }
}

impl Transmitter for UdpTransmitter {
    fn transmit(&mut self, packet: &[u8]) -> Result<()> {
        let sent = self.send(packet).map_err(|source| SyncError::Transmit {
            addr: self.address(),
            source,
        })?;
        trace!("Sent {} of {} bytes to {}", sent, packet.len(), self.address());
        Ok(())
    }
}
