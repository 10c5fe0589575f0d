use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Wire sequence number reserved for START packets.
pub const SEQ_START: u32 = u32::MAX;
/// Wire sequence number reserved for END packets.
pub const SEQ_END: u32 = u32::MAX - 1;

/// The four packet kinds of the stop-and-wait exchange, with the
/// integer codes used by scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    Start,
    Data,
    Ack,
    End,
}

impl PacketType {
    pub fn code(&self) -> u8 {
        match self {
            PacketType::Start => 1,
            PacketType::Data => 2,
            PacketType::Ack => 3,
            PacketType::End => 4,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            1 => Ok(PacketType::Start),
            2 => Ok(PacketType::Data),
            3 => Ok(PacketType::Ack),
            4 => Ok(PacketType::End),
            other => Err(ProtocolError::InvalidPacketType(other)),
        }
    }
}

/// A simulated endpoint identifier (address + port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Packet contents as a closed tagged variant: a field exists only on
/// the kinds for which it is meaningful, so an ACK without an
/// acknowledgement number (or a START with a payload) cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PacketBody {
    Start,
    Data { seq: u32, payload: Bytes },
    Ack { ack: u32 },
    End,
}

/// An immutable protocol packet.
///
/// `rendered` is display text derived purely from the other fields; it
/// is never consulted for protocol decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Packet {
    body: PacketBody,
    window_size: u16,
    src: Endpoint,
    dst: Endpoint,
    rendered: String,
}

impl Packet {
    pub fn new(body: PacketBody, window_size: u16, src: Endpoint, dst: Endpoint) -> Self {
        let rendered = render(&body);
        Self {
            body,
            window_size,
            src,
            dst,
            rendered,
        }
    }

    pub fn start(window_size: u16, src: Endpoint, dst: Endpoint) -> Self {
        Self::new(PacketBody::Start, window_size, src, dst)
    }

    pub fn data(seq: u32, payload: Bytes, window_size: u16, src: Endpoint, dst: Endpoint) -> Self {
        Self::new(PacketBody::Data { seq, payload }, window_size, src, dst)
    }

    pub fn ack(ack: u32, window_size: u16, src: Endpoint, dst: Endpoint) -> Self {
        Self::new(PacketBody::Ack { ack }, window_size, src, dst)
    }

    pub fn end(window_size: u16, src: Endpoint, dst: Endpoint) -> Self {
        Self::new(PacketBody::End, window_size, src, dst)
    }

    /// Build a packet from a raw type code, the way scenario files and
    /// external callers describe packets. Sequence and acknowledgement
    /// numbers irrelevant to the kind are ignored, as is the payload
    /// for non-DATA kinds.
    pub fn make_packet(
        type_code: u8,
        seq: u32,
        ack: u32,
        window_size: u16,
        src: Endpoint,
        dst: Endpoint,
        payload: Bytes,
    ) -> Result<Self, ProtocolError> {
        let body = match PacketType::from_code(type_code)? {
            PacketType::Start => PacketBody::Start,
            PacketType::Data => PacketBody::Data { seq, payload },
            PacketType::Ack => PacketBody::Ack { ack },
            PacketType::End => PacketBody::End,
        };
        Ok(Self::new(body, window_size, src, dst))
    }

    pub fn body(&self) -> &PacketBody {
        &self.body
    }

    pub fn into_body(self) -> PacketBody {
        self.body
    }

    pub fn packet_type(&self) -> PacketType {
        match self.body {
            PacketBody::Start => PacketType::Start,
            PacketBody::Data { .. } => PacketType::Data,
            PacketBody::Ack { .. } => PacketType::Ack,
            PacketBody::End => PacketType::End,
        }
    }

    /// The sequence number as carried on the wire: data packets carry
    /// their own seq, START/END carry the reserved sentinels. ACKs
    /// carry no sequence number and report 0 here.
    pub fn wire_seq(&self) -> u32 {
        match self.body {
            PacketBody::Start => SEQ_START,
            PacketBody::Data { seq, .. } => seq,
            PacketBody::Ack { .. } => 0,
            PacketBody::End => SEQ_END,
        }
    }

    pub fn ack_num(&self) -> Option<u32> {
        match self.body {
            PacketBody::Ack { ack } => Some(ack),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match &self.body {
            PacketBody::Data { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// The number that identifies this packet in log lines: the ack
    /// number for ACKs, the wire sequence number for everything else.
    pub fn trace_num(&self) -> u32 {
        match self.body {
            PacketBody::Ack { ack } => ack,
            _ => self.wire_seq(),
        }
    }

    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    pub fn src(&self) -> &Endpoint {
        &self.src
    }

    pub fn dst(&self) -> &Endpoint {
        &self.dst
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }
}

fn render(body: &PacketBody) -> String {
    match body {
        PacketBody::Start => "SOT - Start of Transmission".to_string(),
        PacketBody::Data { seq, .. } => format!("Packet Number: {seq}"),
        PacketBody::Ack { ack } => format!("Acknowledgement Number: {ack}"),
        PacketBody::End => "EOT - End of Transmission".to_string(),
    }
}
