//! Binary encode/decode: segment table, flat node arena, and the packed
//! word-compression transform (spec.md §4.1, §6.1, §8.6).
//!
//! Expression trees are flattened into one shared, index-addressed arena
//! before encoding (children always precede parents, so an index a node
//! carries always refers backwards). Decoding replays the arena in a single
//! forward pass with no recursion: each record's tag fully determines how
//! many further bytes it consumes, and any index it carries already has a
//! resolved entry in the `nodes` vector being built.

use std::convert::TryInto;

use super::{Advertisement, Message, MessageBody, Request, TraversalLimit, WireError};
use crate::expr::{
    BinaryOpKind, BoundaryPair, Coeff, ListOpKind, Polynomial, RealCase, RealExpr, SetCase,
    SetExpr, UnaryOpKind,
};

const REAL_TAG_BASE: u8 = 0;
const SET_TAG_BASE: u8 = 16;

// ---------------------------------------------------------------------
// byte-level writer / reader
// ---------------------------------------------------------------------

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }
    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }
    fn vec_u32(&mut self, v: &[u32]) {
        self.u32(v.len() as u32);
        for x in v {
            self.u32(*x);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
    used: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], limit: TraversalLimit) -> Self {
        Reader {
            buf,
            pos: 0,
            limit: limit.0,
            used: 0,
        }
    }

    fn consume(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.used += n;
        if self.used > self.limit {
            return Err(WireError::TraversalLimitExceeded {
                limit: self.limit,
                used: self.used,
            });
        }
        if self.pos + n > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.consume(1)?[0])
    }
    fn u32(&mut self) -> Result<u32, WireError> {
        let b = self.consume(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }
    fn f64(&mut self) -> Result<f64, WireError> {
        let b = self.consume(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }
    fn string(&mut self) -> Result<String, WireError> {
        let len = self.u32()? as usize;
        let bytes = self.consume(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::Utf8)
    }
    fn vec_u32(&mut self) -> Result<Vec<u32>, WireError> {
        let n = self.u32()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.u32()?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------
// op-kind <-> tag byte
// ---------------------------------------------------------------------

fn unary_tag(op: UnaryOpKind) -> u8 {
    op as u8
}
fn unary_from_tag(tag: u8) -> Result<UnaryOpKind, WireError> {
    use UnaryOpKind::*;
    Ok(match tag {
        0 => Negate,
        1 => Exp,
        2 => Sin,
        3 => Cos,
        4 => Tan,
        5 => Square,
        6 => Sqrt,
        7 => Log10,
        8 => Ln,
        9 => MultInv,
        10 => Round,
        11 => Floor,
        12 => Ceil,
        13 => Abs,
        14 => Sign,
        _ => {
            return Err(WireError::TagMismatch {
                expected: "UnaryOpKind",
                tag,
            })
        }
    })
}

fn binary_tag(op: BinaryOpKind) -> u8 {
    op as u8
}
fn binary_from_tag(tag: u8) -> Result<BinaryOpKind, WireError> {
    use BinaryOpKind::*;
    Ok(match tag {
        0 => Sum,
        1 => Prod,
        2 => Pow,
        3 => Min,
        4 => Max,
        5 => LessEqThan,
        6 => GreaterThan,
        _ => {
            return Err(WireError::TagMismatch {
                expected: "BinaryOpKind",
                tag,
            })
        }
    })
}

fn list_tag(op: ListOpKind) -> u8 {
    op as u8
}
fn list_from_tag(tag: u8) -> Result<ListOpKind, WireError> {
    use ListOpKind::*;
    Ok(match tag {
        0 => Sum,
        1 => Prod,
        _ => {
            return Err(WireError::TagMismatch {
                expected: "ListOpKind",
                tag,
            })
        }
    })
}

fn write_polynomial(poly: &Polynomial, w: &mut Writer) {
    w.u32(poly.variables.len() as u32);
    for v in &poly.variables {
        w.string(v);
    }
    w.u32(poly.max_var_degree);
    w.u32(poly.coefficients.len() as u32);
    for c in &poly.coefficients {
        w.u32(c.offset);
        w.f64(c.value);
    }
}

fn read_polynomial(r: &mut Reader) -> Result<Polynomial, WireError> {
    let nvars = r.u32()? as usize;
    let mut variables = Vec::with_capacity(nvars);
    for _ in 0..nvars {
        variables.push(r.string()?);
    }
    let max_var_degree = r.u32()?;
    let ncoeff = r.u32()? as usize;
    let mut coefficients = Vec::with_capacity(ncoeff);
    for _ in 0..ncoeff {
        let offset = r.u32()?;
        let value = r.f64()?;
        coefficients.push(Coeff { offset, value });
    }
    Ok(Polynomial {
        variables,
        max_var_degree,
        coefficients,
    })
}

// ---------------------------------------------------------------------
// flatten (encode-time tree walk; trusted in-memory data, recursion ok)
// ---------------------------------------------------------------------

struct Arena {
    writer: Writer,
    count: u32,
}

impl Arena {
    fn bump(&mut self) -> u32 {
        let idx = self.count;
        self.count += 1;
        idx
    }
}

fn flatten_real(expr: &RealExpr, arena: &mut Arena) -> u32 {
    match expr {
        RealExpr::Real(v) => {
            arena.writer.u8(REAL_TAG_BASE);
            arena.writer.f64(*v);
            arena.bump()
        }
        RealExpr::Variable(name) => {
            arena.writer.u8(REAL_TAG_BASE + 1);
            arena.writer.string(name);
            arena.bump()
        }
        RealExpr::Reference(name) => {
            arena.writer.u8(REAL_TAG_BASE + 2);
            arena.writer.string(name);
            arena.bump()
        }
        RealExpr::Name(name, child) => {
            let child_idx = flatten_real(child, arena);
            arena.writer.u8(REAL_TAG_BASE + 3);
            arena.writer.string(name);
            arena.writer.u32(child_idx);
            arena.bump()
        }
        RealExpr::UnaryOp { op, arg } => {
            let arg_idx = flatten_real(arg, arena);
            arena.writer.u8(REAL_TAG_BASE + 4);
            arena.writer.u8(unary_tag(*op));
            arena.writer.u32(arg_idx);
            arena.bump()
        }
        RealExpr::BinaryOp { op, a, b } => {
            let a_idx = flatten_real(a, arena);
            let b_idx = flatten_real(b, arena);
            arena.writer.u8(REAL_TAG_BASE + 5);
            arena.writer.u8(binary_tag(*op));
            arena.writer.u32(a_idx);
            arena.writer.u32(b_idx);
            arena.bump()
        }
        RealExpr::ListOp { op, args } => {
            let idxs: Vec<u32> = args.iter().map(|a| flatten_real(a, arena)).collect();
            arena.writer.u8(REAL_TAG_BASE + 6);
            arena.writer.u8(list_tag(*op));
            arena.writer.vec_u32(&idxs);
            arena.bump()
        }
        RealExpr::Polynomial(poly) => {
            arena.writer.u8(REAL_TAG_BASE + 7);
            write_polynomial(poly, &mut arena.writer);
            arena.bump()
        }
        RealExpr::CaseDistinction { vars, cases } => {
            let mut pairs = Vec::with_capacity(cases.len());
            for case in cases {
                let set_idx = flatten_set(&case.set, arena);
                let real_idx = flatten_real(&case.expression, arena);
                pairs.push((set_idx, real_idx));
            }
            arena.writer.u8(REAL_TAG_BASE + 8);
            arena.writer.u32(vars.len() as u32);
            for v in vars {
                arena.writer.string(v);
            }
            arena.writer.u32(pairs.len() as u32);
            for (s, r) in &pairs {
                arena.writer.u32(*s);
                arena.writer.u32(*r);
            }
            arena.bump()
        }
    }
}

fn flatten_set(set: &SetExpr, arena: &mut Arena) -> u32 {
    match set {
        SetExpr::Singleton(coords) => {
            let idxs: Vec<u32> = coords.iter().map(|c| flatten_real(c, arena)).collect();
            arena.writer.u8(SET_TAG_BASE);
            arena.writer.vec_u32(&idxs);
            arena.bump()
        }
        SetExpr::Ball { center, radius } => {
            let cidx: Vec<u32> = center.iter().map(|c| flatten_real(c, arena)).collect();
            let ridx = flatten_real(radius, arena);
            arena.writer.u8(SET_TAG_BASE + 1);
            arena.writer.vec_u32(&cidx);
            arena.writer.u32(ridx);
            arena.bump()
        }
        SetExpr::Rectangle(bounds) => {
            let pairs: Vec<(u32, u32)> = bounds
                .iter()
                .map(|p| (flatten_real(&p.a, arena), flatten_real(&p.b, arena)))
                .collect();
            arena.writer.u8(SET_TAG_BASE + 2);
            arena.writer.u32(pairs.len() as u32);
            for (a, b) in &pairs {
                arena.writer.u32(*a);
                arena.writer.u32(*b);
            }
            arena.bump()
        }
        SetExpr::ConvexPolytope { a, b } => {
            let a_idxs: Vec<Vec<u32>> = a
                .iter()
                .map(|row| row.iter().map(|c| flatten_real(c, arena)).collect())
                .collect();
            let b_idxs: Vec<u32> = b.iter().map(|c| flatten_real(c, arena)).collect();
            arena.writer.u8(SET_TAG_BASE + 3);
            arena.writer.u32(a_idxs.len() as u32);
            for row in &a_idxs {
                arena.writer.vec_u32(row);
            }
            arena.writer.vec_u32(&b_idxs);
            arena.bump()
        }
        SetExpr::Intersection(children) => {
            let idxs: Vec<u32> = children.iter().map(|c| flatten_set(c, arena)).collect();
            arena.writer.u8(SET_TAG_BASE + 4);
            arena.writer.vec_u32(&idxs);
            arena.bump()
        }
        SetExpr::Name(name, child) => {
            let child_idx = flatten_set(child, arena);
            arena.writer.u8(SET_TAG_BASE + 5);
            arena.writer.string(name);
            arena.writer.u32(child_idx);
            arena.bump()
        }
        SetExpr::Reference(name) => {
            arena.writer.u8(SET_TAG_BASE + 6);
            arena.writer.string(name);
            arena.bump()
        }
        SetExpr::CaseDistinction { vars, cases } => {
            let mut pairs = Vec::with_capacity(cases.len());
            for case in cases {
                let guard_idx = flatten_set(&case.guard, arena);
                let body_idx = flatten_set(&case.body, arena);
                pairs.push((guard_idx, body_idx));
            }
            arena.writer.u8(SET_TAG_BASE + 7);
            arena.writer.u32(vars.len() as u32);
            for v in vars {
                arena.writer.string(v);
            }
            arena.writer.u32(pairs.len() as u32);
            for (g, b) in &pairs {
                arena.writer.u32(*g);
                arena.writer.u32(*b);
            }
            arena.bump()
        }
    }
}

// ---------------------------------------------------------------------
// decode (single forward pass, no recursion)
// ---------------------------------------------------------------------

enum AnyNode {
    Real(RealExpr),
    Set(SetExpr),
}

fn real_at(nodes: &[AnyNode], idx: u32) -> Result<RealExpr, WireError> {
    match nodes.get(idx as usize) {
        Some(AnyNode::Real(r)) => Ok(r.clone()),
        Some(AnyNode::Set(_)) => Err(WireError::TagMismatch {
            expected: "RealExpr",
            tag: SET_TAG_BASE,
        }),
        None => Err(WireError::BadNodeIndex {
            index: idx,
            len: nodes.len(),
        }),
    }
}

fn set_at(nodes: &[AnyNode], idx: u32) -> Result<SetExpr, WireError> {
    match nodes.get(idx as usize) {
        Some(AnyNode::Set(s)) => Ok(s.clone()),
        Some(AnyNode::Real(_)) => Err(WireError::TagMismatch {
            expected: "SetExpr",
            tag: REAL_TAG_BASE,
        }),
        None => Err(WireError::BadNodeIndex {
            index: idx,
            len: nodes.len(),
        }),
    }
}

fn decode_node(r: &mut Reader, nodes: &[AnyNode]) -> Result<AnyNode, WireError> {
    let tag = r.u8()?;
    if tag < SET_TAG_BASE {
        let expr = match tag - REAL_TAG_BASE {
            0 => RealExpr::Real(r.f64()?),
            1 => RealExpr::Variable(r.string()?),
            2 => RealExpr::Reference(r.string()?),
            3 => {
                let name = r.string()?;
                let child_idx = r.u32()?;
                RealExpr::Name(name, Box::new(real_at(nodes, child_idx)?))
            }
            4 => {
                let op = unary_from_tag(r.u8()?)?;
                let arg_idx = r.u32()?;
                RealExpr::UnaryOp {
                    op,
                    arg: Box::new(real_at(nodes, arg_idx)?),
                }
            }
            5 => {
                let op = binary_from_tag(r.u8()?)?;
                let a_idx = r.u32()?;
                let b_idx = r.u32()?;
                RealExpr::BinaryOp {
                    op,
                    a: Box::new(real_at(nodes, a_idx)?),
                    b: Box::new(real_at(nodes, b_idx)?),
                }
            }
            6 => {
                let op = list_from_tag(r.u8()?)?;
                let idxs = r.vec_u32()?;
                let mut args = Vec::with_capacity(idxs.len());
                for idx in idxs {
                    args.push(real_at(nodes, idx)?);
                }
                RealExpr::ListOp { op, args }
            }
            7 => RealExpr::Polynomial(read_polynomial(r)?),
            8 => {
                let nvars = r.u32()? as usize;
                let mut vars = Vec::with_capacity(nvars);
                for _ in 0..nvars {
                    vars.push(r.string()?);
                }
                let ncases = r.u32()? as usize;
                let mut cases = Vec::with_capacity(ncases);
                for _ in 0..ncases {
                    let set_idx = r.u32()?;
                    let real_idx = r.u32()?;
                    cases.push(RealCase {
                        set: set_at(nodes, set_idx)?,
                        expression: real_at(nodes, real_idx)?,
                    });
                }
                RealExpr::CaseDistinction { vars, cases }
            }
            other => {
                return Err(WireError::TagMismatch {
                    expected: "RealExpr node tag",
                    tag: other,
                })
            }
        };
        Ok(AnyNode::Real(expr))
    } else {
        let set = match tag - SET_TAG_BASE {
            0 => {
                let idxs = r.vec_u32()?;
                let mut coords = Vec::with_capacity(idxs.len());
                for idx in idxs {
                    coords.push(real_at(nodes, idx)?);
                }
                SetExpr::Singleton(coords)
            }
            1 => {
                let cidx = r.vec_u32()?;
                let ridx = r.u32()?;
                let mut center = Vec::with_capacity(cidx.len());
                for idx in cidx {
                    center.push(real_at(nodes, idx)?);
                }
                SetExpr::Ball {
                    center,
                    radius: real_at(nodes, ridx)?,
                }
            }
            2 => {
                let n = r.u32()? as usize;
                let mut bounds = Vec::with_capacity(n);
                for _ in 0..n {
                    let a_idx = r.u32()?;
                    let b_idx = r.u32()?;
                    bounds.push(BoundaryPair {
                        a: real_at(nodes, a_idx)?,
                        b: real_at(nodes, b_idx)?,
                    });
                }
                SetExpr::Rectangle(bounds)
            }
            3 => {
                let nrows = r.u32()? as usize;
                let mut a = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    let row_idxs = r.vec_u32()?;
                    let mut row = Vec::with_capacity(row_idxs.len());
                    for idx in row_idxs {
                        row.push(real_at(nodes, idx)?);
                    }
                    a.push(row);
                }
                let b_idxs = r.vec_u32()?;
                let mut b = Vec::with_capacity(b_idxs.len());
                for idx in b_idxs {
                    b.push(real_at(nodes, idx)?);
                }
                SetExpr::ConvexPolytope { a, b }
            }
            4 => {
                let idxs = r.vec_u32()?;
                let mut children = Vec::with_capacity(idxs.len());
                for idx in idxs {
                    children.push(set_at(nodes, idx)?);
                }
                SetExpr::Intersection(children)
            }
            5 => {
                let name = r.string()?;
                let child_idx = r.u32()?;
                SetExpr::Name(name, Box::new(set_at(nodes, child_idx)?))
            }
            6 => SetExpr::Reference(r.string()?),
            7 => {
                let nvars = r.u32()? as usize;
                let mut vars = Vec::with_capacity(nvars);
                for _ in 0..nvars {
                    vars.push(r.string()?);
                }
                let ncases = r.u32()? as usize;
                let mut cases = Vec::with_capacity(ncases);
                for _ in 0..ncases {
                    let guard_idx = r.u32()?;
                    let body_idx = r.u32()?;
                    cases.push(SetCase {
                        guard: set_at(nodes, guard_idx)?,
                        body: set_at(nodes, body_idx)?,
                    });
                }
                SetExpr::CaseDistinction { vars, cases }
            }
            other => {
                return Err(WireError::TagMismatch {
                    expected: "SetExpr node tag",
                    tag: other,
                })
            }
        };
        Ok(AnyNode::Set(set))
    }
}

fn pad_to_8(mut buf: Vec<u8>) -> Vec<u8> {
    let rem = buf.len() % 8;
    if rem != 0 {
        buf.resize(buf.len() + (8 - rem), 0);
    }
    buf
}

/// Encode `msg` in canonical (unpacked) form: an 8-byte-aligned segment
/// table followed by one 8-byte-aligned segment.
pub fn encode_unpacked(msg: &Message) -> Vec<u8> {
    let mut arena = Arena {
        writer: Writer::default(),
        count: 0,
    };
    let mut header = Writer::default();
    header.u32(msg.agent_id);
    match &msg.body {
        MessageBody::Advertisement(adv) => {
            let pq_idx = flatten_set(&adv.pq_profile, &mut arena);
            let belief_idx = flatten_set(&adv.belief_function, &mut arena);
            let cost_idx = flatten_real(&adv.cost_function, &mut arena);
            header.u8(0);
            header.u32(pq_idx);
            header.u32(belief_idx);
            header.u32(cost_idx);
            header.f64(adv.implemented_setpoint[0]);
            header.f64(adv.implemented_setpoint[1]);
        }
        MessageBody::Request(req) => {
            header.u8(1);
            match req.setpoint {
                Some([x, y]) => {
                    header.u8(1);
                    header.f64(x);
                    header.f64(y);
                }
                None => header.u8(0),
            }
        }
    }

    let mut body = Writer::default();
    body.u32(arena.count);
    body.bytes(&arena.writer.buf);
    body.bytes(&header.buf);
    let padded = pad_to_8(body.buf);

    let mut out = Writer::default();
    out.u32(1); // segment count
    out.u32((padded.len() / 8) as u32); // word count
    out.bytes(&padded);
    out.buf
}

/// Decode a message produced by [`encode_unpacked`].
pub fn decode_unpacked(bytes: &[u8], limit: TraversalLimit) -> Result<Message, WireError> {
    let mut r = Reader::new(bytes, limit);
    let segment_count = r.u32()?;
    if segment_count != 1 {
        return Err(WireError::BadSegmentTable);
    }
    let _word_count = r.u32()?;

    let node_count = r.u32()?;
    let mut nodes: Vec<AnyNode> = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        let node = decode_node(&mut r, &nodes)?;
        nodes.push(node);
    }

    let agent_id = r.u32()?;
    let tag = r.u8()?;
    let body = match tag {
        0 => {
            let pq_idx = r.u32()?;
            let belief_idx = r.u32()?;
            let cost_idx = r.u32()?;
            let x = r.f64()?;
            let y = r.f64()?;
            MessageBody::Advertisement(Advertisement {
                pq_profile: set_at(&nodes, pq_idx)?,
                belief_function: set_at(&nodes, belief_idx)?,
                cost_function: real_at(&nodes, cost_idx)?,
                implemented_setpoint: [x, y],
            })
        }
        1 => {
            let has_setpoint = r.u8()?;
            let setpoint = if has_setpoint != 0 {
                let x = r.f64()?;
                let y = r.f64()?;
                Some([x, y])
            } else {
                None
            };
            MessageBody::Request(Request { setpoint })
        }
        other => {
            return Err(WireError::TagMismatch {
                expected: "MessageBody tag",
                tag: other,
            })
        }
    };

    Ok(Message { agent_id, body })
}

/// Apply Cap'n-Proto-style word packing: each 8-byte word is replaced by a
/// tag byte (a run-length count for all-zero words, or a non-zero bitmask
/// followed by its literal non-zero bytes).
pub fn pack(data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len() % 8, 0);
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let word = &data[i..i + 8];
        if word.iter().all(|&b| b == 0) {
            let mut run: u8 = 0;
            let mut j = i + 8;
            while j + 8 <= data.len() && run < 255 && data[j..j + 8].iter().all(|&b| b == 0) {
                run += 1;
                j += 8;
            }
            out.push(0);
            out.push(run);
            i = j;
        } else {
            let mut mask: u8 = 0;
            let mut literal = Vec::with_capacity(8);
            for (bit, &b) in word.iter().enumerate() {
                if b != 0 {
                    mask |= 1 << bit;
                    literal.push(b);
                }
            }
            out.push(mask);
            out.extend_from_slice(&literal);
            i += 8;
        }
    }
    out
}

/// Invert [`pack`].
pub fn unpack(data: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let tag = data[i];
        i += 1;
        if tag == 0 {
            if i >= data.len() {
                return Err(WireError::Truncated);
            }
            let run = data[i] as usize;
            i += 1;
            out.resize(out.len() + 8 * (1 + run), 0);
        } else {
            let mut word = [0u8; 8];
            for (bit, slot) in word.iter_mut().enumerate() {
                if tag & (1 << bit) != 0 {
                    if i >= data.len() {
                        return Err(WireError::Truncated);
                    }
                    *slot = data[i];
                    i += 1;
                }
            }
            out.extend_from_slice(&word);
        }
    }
    Ok(out)
}

/// Encode `msg` then apply [`pack`].
pub fn encode_packed(msg: &Message) -> Vec<u8> {
    pack(&encode_unpacked(msg))
}

/// Invert [`unpack`] then [`decode_unpacked`].
pub fn decode_packed(bytes: &[u8], limit: TraversalLimit) -> Result<Message, WireError> {
    let unpacked = unpack(bytes)?;
    decode_unpacked(&unpacked, limit)
}
