//! Big-endian binary codec for boxes and graph dumps.
//!
//! Box payload layout:
//!
//! ```text
//! [i32 structure version][i32 start flag][i32 field count]
//!   ([u16 key][u8 kind tag][value])*
//! [i32 end flag]
//! ```
//!
//! Objects nest the same `count (key tag value)*` list; arrays write their
//! length followed by the bare element values. A pointer value is `u8 0` when
//! empty or `u8 1` followed by the target address.
//!
//! Graph dumps and preset files share the record list written by
//! [`write_records`] behind a `[magic][version]` header.

use bytes::{Buf, BufMut};

use crate::address::{Address, BoxId, FieldKey, FieldPath};
use crate::catalog::BoxKind;
use crate::error::CoreError;
use crate::field::{FieldNode, Value};
use crate::schema::{FieldKind, FieldSchema};

pub const BOX_STRUCTURE_VERSION: i32 = 1;
pub const BOX_START_FLAG: i32 = 0x0bad_f00d;
pub const BOX_END_FLAG: i32 = 0x0dea_dbee;

/// `"BXGR"`
pub const GRAPH_MAGIC: i32 = 0x4258_4752;
pub const GRAPH_FORMAT_VERSION: i32 = 1;

/// One serialized box inside a graph dump or preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRecord {
    pub kind: BoxKind,
    pub id: BoxId,
    pub payload: Vec<u8>,
}

fn ensure(input: &impl Buf, needed: usize, what: &str) -> Result<(), CoreError> {
    if input.remaining() < needed {
        return Err(CoreError::corrupt(format!(
            "truncated {}: need {} bytes, {} left",
            what,
            needed,
            input.remaining()
        )));
    }
    Ok(())
}

fn get_len(input: &mut impl Buf, what: &str) -> Result<usize, CoreError> {
    ensure(input, 4, what)?;
    let len = input.get_i32();
    usize::try_from(len).map_err(|_| CoreError::corrupt(format!("negative {} length", what)))
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

pub fn put_address(out: &mut impl BufMut, address: Option<&Address>) {
    match address {
        None => out.put_u8(0),
        Some(address) => {
            out.put_u8(1);
            out.put_slice(address.id.as_bytes());
            out.put_u8(address.path.len() as u8);
            for key in &address.path {
                out.put_u16(*key);
            }
        }
    }
}

pub fn get_address(input: &mut impl Buf) -> Result<Option<Address>, CoreError> {
    ensure(input, 1, "address")?;
    match input.get_u8() {
        0 => Ok(None),
        1 => {
            let id = get_id(input)?;
            ensure(input, 1, "address path")?;
            let len = input.get_u8() as usize;
            ensure(input, len * 2, "address path")?;
            let path: FieldPath = (0..len).map(|_| input.get_u16()).collect();
            Ok(Some(Address { id, path }))
        }
        other => Err(CoreError::corrupt(format!("invalid address flag {}", other))),
    }
}

pub fn get_id(input: &mut impl Buf) -> Result<BoxId, CoreError> {
    ensure(input, 16, "box id")?;
    let mut bytes = [0u8; 16];
    input.copy_to_slice(&mut bytes);
    Ok(BoxId::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Box payloads
// ---------------------------------------------------------------------------

/// Writes a full box payload including version and framing flags.
pub fn write_box(out: &mut impl BufMut, fields: &'static [FieldSchema], nodes: &[FieldNode]) {
    out.put_i32(BOX_STRUCTURE_VERSION);
    out.put_i32(BOX_START_FLAG);
    write_fields(out, fields, nodes);
    out.put_i32(BOX_END_FLAG);
}

/// Reads a box payload. Fields missing from the payload keep their defaults.
pub fn read_box(
    input: &mut impl Buf,
    fields: &'static [FieldSchema],
) -> Result<Vec<FieldNode>, CoreError> {
    ensure(input, 8, "box header")?;
    let version = input.get_i32();
    if version != BOX_STRUCTURE_VERSION {
        return Err(CoreError::VersionMismatch {
            found: version,
            supported: BOX_STRUCTURE_VERSION,
        });
    }
    let start = input.get_i32();
    if start != BOX_START_FLAG {
        return Err(CoreError::corrupt(format!("bad start flag {:#010x}", start)));
    }
    let mut nodes = crate::field::defaults(fields);
    read_fields(input, fields, &mut nodes)?;
    ensure(input, 4, "box end flag")?;
    let end = input.get_i32();
    if end != BOX_END_FLAG {
        return Err(CoreError::corrupt(format!("bad end flag {:#010x}", end)));
    }
    Ok(nodes)
}

fn write_fields(out: &mut impl BufMut, fields: &'static [FieldSchema], nodes: &[FieldNode]) {
    out.put_i32(fields.len() as i32);
    for (schema, node) in fields.iter().zip(nodes) {
        out.put_u16(schema.key);
        out.put_u8(schema.kind.tag());
        write_node(out, schema, node);
    }
}

fn write_node(out: &mut impl BufMut, schema: &'static FieldSchema, node: &FieldNode) {
    match node {
        FieldNode::Value(Value::Int32(v)) => out.put_i32(*v),
        FieldNode::Value(Value::Float32(v)) => out.put_f32(*v),
        FieldNode::Value(Value::Boolean(v)) => out.put_u8(u8::from(*v)),
        FieldNode::Value(Value::Text(v)) => {
            out.put_i32(v.len() as i32);
            out.put_slice(v.as_bytes());
        }
        FieldNode::Value(Value::Bytes(v)) => {
            out.put_i32(v.len() as i32);
            out.put_slice(v);
        }
        FieldNode::Pointer(target) => put_address(out, target.as_ref()),
        FieldNode::Hub => {}
        FieldNode::Object(children) => {
            if let FieldKind::Object { fields } = schema.kind {
                write_fields(out, fields, children);
            }
        }
        FieldNode::Array(children) => {
            if let FieldKind::Array { element, .. } = schema.kind {
                out.put_i32(children.len() as i32);
                for child in children {
                    write_node(out, element, child);
                }
            }
        }
    }
}

fn read_fields(
    input: &mut impl Buf,
    fields: &'static [FieldSchema],
    nodes: &mut [FieldNode],
) -> Result<(), CoreError> {
    let count = get_len(input, "field count")?;
    for _ in 0..count {
        ensure(input, 3, "field header")?;
        let key: FieldKey = input.get_u16();
        let tag = input.get_u8();
        let index = fields
            .iter()
            .position(|f| f.key == key)
            .ok_or_else(|| CoreError::corrupt(format!("unknown field key {}", key)))?;
        let schema = &fields[index];
        if schema.kind.tag() != tag {
            return Err(CoreError::corrupt(format!(
                "field '{}' has tag {}, expected {}",
                schema.name,
                tag,
                schema.kind.tag()
            )));
        }
        nodes[index] = read_node(input, schema)?;
    }
    Ok(())
}

fn read_node(input: &mut impl Buf, schema: &'static FieldSchema) -> Result<FieldNode, CoreError> {
    let node = match schema.kind {
        FieldKind::Int32 { .. } => {
            ensure(input, 4, schema.name)?;
            FieldNode::Value(Value::Int32(input.get_i32()))
        }
        FieldKind::Float32 { .. } => {
            ensure(input, 4, schema.name)?;
            FieldNode::Value(Value::Float32(input.get_f32()))
        }
        FieldKind::Boolean { .. } => {
            ensure(input, 1, schema.name)?;
            FieldNode::Value(Value::Boolean(input.get_u8() != 0))
        }
        FieldKind::Text { .. } => {
            let raw = get_blob(input, schema.name)?;
            let text = String::from_utf8(raw)
                .map_err(|_| CoreError::corrupt(format!("field '{}' is not utf-8", schema.name)))?;
            FieldNode::Value(Value::Text(text))
        }
        FieldKind::Bytes => FieldNode::Value(Value::Bytes(get_blob(input, schema.name)?)),
        FieldKind::Pointer { .. } => FieldNode::Pointer(get_address(input)?),
        FieldKind::Hub => FieldNode::Hub,
        FieldKind::Object { fields } => {
            let mut children = crate::field::defaults(fields);
            read_fields(input, fields, &mut children)?;
            FieldNode::Object(children)
        }
        FieldKind::Array { length, element } => {
            let count = get_len(input, schema.name)?;
            if count > length as usize {
                return Err(CoreError::corrupt(format!(
                    "array '{}' has {} elements, capacity {}",
                    schema.name, count, length
                )));
            }
            let mut children = Vec::with_capacity(length as usize);
            for _ in 0..count {
                children.push(read_node(input, element)?);
            }
            while children.len() < length as usize {
                children.push(FieldNode::with_defaults(element));
            }
            FieldNode::Array(children)
        }
    };
    Ok(node)
}

fn get_blob(input: &mut impl Buf, what: &str) -> Result<Vec<u8>, CoreError> {
    let len = get_len(input, what)?;
    ensure(input, len, what)?;
    let mut raw = vec![0u8; len];
    input.copy_to_slice(&mut raw);
    Ok(raw)
}

// ---------------------------------------------------------------------------
// Headers and record lists
// ---------------------------------------------------------------------------

pub fn write_header(out: &mut impl BufMut, magic: i32, version: i32) {
    out.put_i32(magic);
    out.put_i32(version);
}

/// Checks magic and version before anything else is decoded.
pub fn read_header(input: &mut impl Buf, magic: i32, supported: i32) -> Result<(), CoreError> {
    ensure(input, 8, "header")?;
    let found = input.get_i32();
    if found != magic {
        return Err(CoreError::InvalidMagic {
            expected: magic,
            found,
        });
    }
    let version = input.get_i32();
    if version != supported {
        return Err(CoreError::VersionMismatch {
            found: version,
            supported,
        });
    }
    Ok(())
}

pub fn write_records(out: &mut impl BufMut, records: &[BoxRecord]) {
    out.put_i32(records.len() as i32);
    for record in records {
        out.put_u16(record.kind.key());
        out.put_slice(record.id.as_bytes());
        out.put_i32(record.payload.len() as i32);
        out.put_slice(&record.payload);
    }
}

pub fn read_records(input: &mut impl Buf) -> Result<Vec<BoxRecord>, CoreError> {
    let count = get_len(input, "record count")?;
    let mut records = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        ensure(input, 2, "record kind")?;
        let key = input.get_u16();
        let kind = BoxKind::from_key(key).ok_or(CoreError::UnknownBoxKind { key })?;
        let id = get_id(input)?;
        let payload = get_blob(input, "record payload")?;
        records.push(BoxRecord { kind, id, payload });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{audio_region, step_sequencer};
    use crate::field::{defaults, resolve, resolve_mut};
    use bytes::BytesMut;
    use proptest::prelude::*;

    fn encode(kind: BoxKind, nodes: &[FieldNode]) -> Vec<u8> {
        let mut out = BytesMut::new();
        write_box(&mut out, kind.schema().fields, nodes);
        out.to_vec()
    }

    #[test]
    fn address_encoding_layout() {
        let address = Address::new(BoxId::from_bytes([1; 16]), &[3, 0x0102]);
        let mut out = BytesMut::new();
        put_address(&mut out, Some(&address));
        assert_eq!(out.len(), 1 + 16 + 1 + 4);
        assert_eq!(out[0], 1);
        assert_eq!(out[17], 2);
        assert_eq!(&out[18..22], &[0, 3, 1, 2]);

        let mut input = &out[..];
        assert_eq!(get_address(&mut input).unwrap(), Some(address));
        assert_eq!(input.remaining(), 0);

        let mut empty = BytesMut::new();
        put_address(&mut empty, None);
        assert_eq!(&empty[..], &[0]);
    }

    #[test]
    fn payload_starts_with_version_and_flag() {
        let fields = BoxKind::AudioRegion.schema().fields;
        let bytes = encode(BoxKind::AudioRegion, &defaults(fields));
        let mut input = &bytes[..];
        assert_eq!(input.get_i32(), BOX_STRUCTURE_VERSION);
        assert_eq!(input.get_i32(), BOX_START_FLAG);
        assert_eq!(input.get_i32(), fields.len() as i32);
        assert_eq!(&bytes[bytes.len() - 4..], &BOX_END_FLAG.to_be_bytes());
    }

    #[test]
    fn pattern_grid_survives_encoding() {
        let fields = BoxKind::StepSequencer.schema().fields;
        let mut nodes = defaults(fields);
        let velocity = [
            step_sequencer::PATTERNS,
            9,
            step_sequencer::pattern::STEPS,
            4,
            step_sequencer::step::VELOCITY,
        ];
        *resolve_mut(fields, &mut nodes, &velocity).unwrap().1 =
            FieldNode::Value(Value::Float32(0.25));

        let bytes = encode(BoxKind::StepSequencer, &nodes);
        let decoded = read_box(&mut &bytes[..], fields).unwrap();
        assert_eq!(decoded, nodes);
        assert_eq!(
            resolve(fields, &decoded, &velocity).unwrap().1.as_value(),
            Some(&Value::Float32(0.25))
        );
    }

    #[test]
    fn wrong_version_is_rejected() {
        let fields = BoxKind::AudioFile.schema().fields;
        let mut bytes = encode(BoxKind::AudioFile, &defaults(fields));
        bytes[..4].copy_from_slice(&7i32.to_be_bytes());
        assert!(matches!(
            read_box(&mut &bytes[..], fields),
            Err(CoreError::VersionMismatch { found: 7, .. })
        ));
    }

    #[test]
    fn tag_mismatch_is_corrupt() {
        let mut out = BytesMut::new();
        out.put_i32(BOX_STRUCTURE_VERSION);
        out.put_i32(BOX_START_FLAG);
        out.put_i32(1);
        out.put_u16(audio_region::POSITION);
        out.put_u8(FieldKind::Bytes.tag());
        let err = read_box(&mut &out[..], BoxKind::AudioRegion.schema().fields).unwrap_err();
        assert!(matches!(err, CoreError::CorruptPayload { .. }));
    }

    #[test]
    fn header_checks_magic_before_version() {
        let mut out = BytesMut::new();
        write_header(&mut out, 0x1234_5678, 99);
        assert!(matches!(
            read_header(&mut &out[..], GRAPH_MAGIC, GRAPH_FORMAT_VERSION),
            Err(CoreError::InvalidMagic { .. })
        ));

        let mut out = BytesMut::new();
        write_header(&mut out, GRAPH_MAGIC, 99);
        assert!(matches!(
            read_header(&mut &out[..], GRAPH_MAGIC, GRAPH_FORMAT_VERSION),
            Err(CoreError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn unknown_kind_in_record_list() {
        let mut out = BytesMut::new();
        out.put_i32(1);
        out.put_u16(4242);
        assert!(matches!(
            read_records(&mut &out[..]),
            Err(CoreError::UnknownBoxKind { key: 4242 })
        ));
    }

    proptest! {
        #[test]
        fn region_values_roundtrip(
            position in any::<i32>(),
            duration in any::<i32>(),
            label in ".{0,32}",
            mute in any::<bool>(),
        ) {
            let fields = BoxKind::AudioRegion.schema().fields;
            let mut nodes = defaults(fields);
            *resolve_mut(fields, &mut nodes, &[audio_region::POSITION]).unwrap().1 =
                FieldNode::Value(Value::Int32(position));
            *resolve_mut(fields, &mut nodes, &[audio_region::DURATION]).unwrap().1 =
                FieldNode::Value(Value::Int32(duration));
            *resolve_mut(fields, &mut nodes, &[audio_region::LABEL]).unwrap().1 =
                FieldNode::Value(Value::Text(label));
            *resolve_mut(fields, &mut nodes, &[audio_region::MUTE]).unwrap().1 =
                FieldNode::Value(Value::Boolean(mute));

            let bytes = encode(BoxKind::AudioRegion, &nodes);
            prop_assert_eq!(read_box(&mut &bytes[..], fields).unwrap(), nodes);
        }

        #[test]
        fn truncated_payloads_never_panic(cut in 0usize..64) {
            let fields = BoxKind::AudioRegion.schema().fields;
            let bytes = encode(BoxKind::AudioRegion, &defaults(fields));
            let cut = cut.min(bytes.len() - 1);
            prop_assert!(read_box(&mut &bytes[..cut], fields).is_err());
        }
    }
}
