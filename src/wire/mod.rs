//! Wire message envelope and binary codec (spec.md §3.1, §4.1, §6.1, §8.6).
//!
//! A [`Message`] carries exactly one [`MessageBody`] plus an `agent_id`.
//! [`codec`] flattens the expression trees into index-addressed node arrays
//! before encoding, so decoding never recurses through pointers: it walks
//! two flat `Vec`s and resolves child references by index, bounding decoder
//! work by node count and the configured [`TraversalLimit`] rather than by
//! call-stack depth.
//!
//! ```
//! use commelec_advfunc::wire::{codec, Advertisement, Message, MessageBody, TraversalLimit};
//! use commelec_advfunc::expr::{RealExpr, SetExpr};
//!
//! let adv = Advertisement {
//!     pq_profile: SetExpr::Singleton(vec![RealExpr::Real(0.0), RealExpr::Real(0.0)]),
//!     belief_function: SetExpr::Singleton(vec![RealExpr::Real(0.0), RealExpr::Real(0.0)]),
//!     cost_function: RealExpr::Real(1.0),
//!     implemented_setpoint: [0.0, 0.0],
//! };
//! let msg = Message { agent_id: 7, body: MessageBody::Advertisement(adv) };
//! let bytes = codec::encode_unpacked(&msg);
//! let decoded = codec::decode_unpacked(&bytes, TraversalLimit::default()).unwrap();
//! assert_eq!(decoded.agent_id, 7);
//! ```

pub mod codec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::{RealExpr, SetExpr};

/// An advertisement's three expression trees plus the resource's currently
/// implemented setpoint (spec.md §3.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub pq_profile: SetExpr,
    pub belief_function: SetExpr,
    pub cost_function: RealExpr,
    pub implemented_setpoint: [f64; 2],
}

/// A grid agent's request for a setpoint, optionally naming one explicitly
/// (spec.md §3.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub setpoint: Option<[f64; 2]>,
}

/// The payload a [`Message`] carries (spec.md §3.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    Advertisement(Advertisement),
    Request(Request),
}

/// The wire envelope: an originating agent id plus exactly one body variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub agent_id: u32,
    pub body: MessageBody,
}

impl Message {
    /// Re-serialize then re-parse `self`, forcing the same structural
    /// validation a freshly-received datagram would undergo. Grounded in
    /// the original `AdvValidator` constructor's deep-copy-via-rebuild.
    pub fn deep_copy(&self) -> Result<Message, WireError> {
        let bytes = codec::encode_unpacked(self);
        codec::decode_unpacked(&bytes, TraversalLimit::default())
    }

    /// Return the `Advertisement` body, or [`WireError::NotAnAdvertisement`].
    pub fn as_advertisement(&self) -> Result<&Advertisement, WireError> {
        match &self.body {
            MessageBody::Advertisement(adv) => Ok(adv),
            MessageBody::Request(_) => Err(WireError::NotAnAdvertisement),
        }
    }

    /// Return the `Request` body, or [`WireError::NotARequest`].
    pub fn as_request(&self) -> Result<&Request, WireError> {
        match &self.body {
            MessageBody::Request(req) => Ok(req),
            MessageBody::Advertisement(_) => Err(WireError::NotARequest),
        }
    }
}

impl Advertisement {
    /// Validate the presence/shape invariants spec.md §3.1 places on a
    /// well-formed advertisement, independent of reference resolution
    /// (which [`crate::expr::resolve::ReferenceTable::build`] checks).
    pub fn check_well_formed(&self) -> Result<(), WireError> {
        if self.implemented_setpoint.iter().any(|v| v.is_nan()) {
            return Err(WireError::UninitializedImplementedSetpoint);
        }
        Ok(())
    }
}

/// Byte budget the decoder may spend reading one message (spec.md §4.1,
/// §7 `MaxNestingDepthReached`'s wire-level analogue).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraversalLimit(pub usize);

impl Default for TraversalLimit {
    fn default() -> Self {
        // 64 MiB, matching Cap'n Proto's own default traversal limit.
        TraversalLimit(64 * 1024 * 1024)
    }
}

/// Errors raised by the wire codec (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("truncated message")]
    Truncated,
    #[error("traversal limit exceeded: used {used} of {limit} bytes")]
    TraversalLimitExceeded { limit: usize, used: usize },
    #[error("malformed segment table")]
    BadSegmentTable,
    #[error("invalid utf-8 in wire string")]
    Utf8,
    #[error("tag mismatch: expected {expected}, got {tag}")]
    TagMismatch { expected: &'static str, tag: u8 },
    #[error("node index {index} out of range (arena size {len})")]
    BadNodeIndex { index: u32, len: usize },
    #[error("message does not carry an Advertisement")]
    NotAnAdvertisement,
    #[error("message does not carry a Request")]
    NotARequest,
    #[error("implemented_setpoint is missing or has NaN components")]
    UninitializedImplementedSetpoint,
}

/// Shared encode/decode surface for [`Message`], dispatching to the
/// packed or unpacked free functions in [`codec`].
pub trait WireFormat: Sized {
    fn to_bytes(&self, packed: bool) -> Vec<u8>;
    fn from_bytes(bytes: &[u8], packed: bool, limit: TraversalLimit) -> Result<Self, WireError>;
}

impl WireFormat for Message {
    fn to_bytes(&self, packed: bool) -> Vec<u8> {
        if packed {
            codec::encode_packed(self)
        } else {
            codec::encode_unpacked(self)
        }
    }

    fn from_bytes(bytes: &[u8], packed: bool, limit: TraversalLimit) -> Result<Self, WireError> {
        if packed {
            codec::decode_packed(bytes, limit)
        } else {
            codec::decode_unpacked(bytes, limit)
        }
    }
}
