use std::convert::TryInto;
use std::str;

/// Smallest possible encoded message: version, zero-length origin IP,
/// timestamp, empty payload.
pub const MIN_MESSAGE_LEN: usize = 6;

/// Wire message shared by outbound heartbeats and inbound snapshots
///
/// Wire format (multi-byte fields big-endian):
/// - Version: 1 byte
/// - Origin IP length: 1 byte (0-255)
/// - Origin IP: UTF-8, length from the previous field
/// - Timestamp: 4 bytes, unsigned seconds since the Unix epoch
/// - Payload: UTF-8, every remaining byte of the datagram (no length
///   prefix; the datagram boundary delimits it)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Per-sender counter, wraps modulo 256. Only meaningful on heartbeats.
    pub version: u8,
    /// Textual address of the sending node (heartbeat) or the responding
    /// server (snapshot).
    pub origin_ip: String,
    /// Sender's clock at send time, truncated to whole seconds. Clocks are
    /// not synchronized, so timestamps from different nodes do not order.
    pub timestamp: u32,
    /// Opaque text. A heartbeat carries the sender's own file listing, a
    /// snapshot carries the multi-node listing parsed by [`crate::snapshot`].
    pub payload: String,
}

/// Errors that can occur while encoding or decoding a wire message
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("buffer too short: {0} bytes (minimum {MIN_MESSAGE_LEN})")]
    BufferTooShort(usize),
    #[error("declared origin IP length {declared} overruns the buffer ({remaining} bytes left)")]
    IpLengthOverrun { declared: usize, remaining: usize },
    #[error("origin IP too long to encode: {0} bytes (maximum 255)")]
    IpTooLong(usize),
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

impl Message {
    /// Create a new message
    pub fn new(
        version: u8,
        origin_ip: impl Into<String>,
        timestamp: u32,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            version,
            origin_ip: origin_ip.into(),
            timestamp,
            payload: payload.into(),
        }
    }

    /// Total encoded length of this message in bytes
    pub fn encoded_len(&self) -> usize {
        MIN_MESSAGE_LEN + self.origin_ip.len() + self.payload.len()
    }

    /// Encode this message to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let ip = self.origin_ip.as_bytes();
        if ip.len() > u8::MAX as usize {
            return Err(CodecError::IpTooLong(ip.len()));
        }

        let mut buffer = Vec::with_capacity(self.encoded_len());
        buffer.push(self.version);
        buffer.push(ip.len() as u8);
        buffer.extend_from_slice(ip);
        buffer.extend_from_slice(&self.timestamp.to_be_bytes());
        buffer.extend_from_slice(self.payload.as_bytes());

        Ok(buffer)
    }

    /// Decode a message from wire bytes
    ///
    /// `data` must be exactly the bytes the datagram carried, never the
    /// full backing buffer: the payload has no length prefix, so trailing
    /// buffer capacity would be misread as payload.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < MIN_MESSAGE_LEN {
            return Err(CodecError::BufferTooShort(data.len()));
        }

        let version = data[0];
        let ip_len = data[1] as usize;

        // Header, origin IP and timestamp must all fit.
        if data.len() < 2 + ip_len + 4 {
            return Err(CodecError::IpLengthOverrun {
                declared: ip_len,
                remaining: data.len() - 2,
            });
        }

        let ip_end = 2 + ip_len;
        let origin_ip = str::from_utf8(&data[2..ip_end])
            .map_err(|_| CodecError::InvalidUtf8("origin IP"))?
            .to_string();
        let timestamp = u32::from_be_bytes(data[ip_end..ip_end + 4].try_into().unwrap());
        let payload = str::from_utf8(&data[ip_end + 4..])
            .map_err(|_| CodecError::InvalidUtf8("payload"))?
            .to_string();

        Ok(Self {
            version,
            origin_ip,
            timestamp,
            payload,
        })
    }
}
