//! Audio-unit presets.
//!
//! A preset file is `[i32 magic "BXPR"][i32 version]` followed by the record
//! list of a transfer plan whose root (first record) is an audio unit.
//! Decoding is split in two: [`PresetDecoder::read`] checks the header and
//! parses the records without touching any graph, and [`Preset::insert`]
//! applies them inside the caller's open transaction.

use bytes::BytesMut;

use boxgraph_core::catalog::audio_unit;
use boxgraph_core::codec::{self, BoxRecord};
use boxgraph_core::{
    Address, BoxGraph, BoxId, BoxKind, CoreError, ExternalDependents, TransferOptions,
    TransferOutcome, TransferPlan, Value,
};

use crate::error::StorageError;

/// `"BXPR"`
pub const PRESET_MAGIC: i32 = 0x4258_5052;
pub const PRESET_VERSION: i32 = 1;

/// Serializes an audio unit and its dependencies.
pub struct PresetEncoder;

impl PresetEncoder {
    pub fn encode(graph: &BoxGraph, unit: BoxId) -> Result<Vec<u8>, StorageError> {
        let node = graph.get_box(unit)?;
        if node.kind() != BoxKind::AudioUnit {
            return Err(StorageError::NotAnAudioUnit {
                id: unit,
                kind: node.kind(),
            });
        }
        // connections to other units cannot travel with the preset
        let plan = TransferPlan::collect_with(graph, unit, ExternalDependents::Prune)?;
        let mut out = BytesMut::new();
        codec::write_header(&mut out, PRESET_MAGIC, PRESET_VERSION);
        codec::write_records(&mut out, plan.records());
        tracing::debug!(unit = %unit, boxes = plan.records().len(), "preset encoded");
        Ok(out.to_vec())
    }
}

/// Parses preset bytes.
pub struct PresetDecoder;

impl PresetDecoder {
    /// Checks magic and version, then parses the records.
    pub fn read(bytes: &[u8]) -> Result<Preset, StorageError> {
        let mut input = bytes;
        codec::read_header(&mut input, PRESET_MAGIC, PRESET_VERSION)?;
        let records = codec::read_records(&mut input)?;
        if !input.is_empty() {
            return Err(StorageError::InvalidPreset {
                reason: format!("{} trailing bytes", input.len()),
            });
        }
        let Some(first) = records.first() else {
            return Err(StorageError::EmptyPreset);
        };
        if first.kind != BoxKind::AudioUnit {
            return Err(StorageError::InvalidPreset {
                reason: format!("first record is a {}, expected AudioUnit", first.kind.name()),
            });
        }
        Ok(Preset {
            plan: TransferPlan::from_records(records)?,
        })
    }

    /// Reads `bytes` and inserts the unit into `target` under `host`, which
    /// must be an open transaction's graph.
    pub fn decode(
        bytes: &[u8],
        target: &mut BoxGraph,
        host: &Address,
    ) -> Result<TransferOutcome, StorageError> {
        let preset = Self::read(bytes)?;
        Ok(preset.insert(target, host)?)
    }
}

/// A parsed preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    plan: TransferPlan,
}

impl Preset {
    pub fn records(&self) -> &[BoxRecord] {
        self.plan.records()
    }

    /// Inserts the unit as the last unit of `host` (the root's `audio_units`
    /// hub). Requires an open transaction in `target`.
    pub fn insert(&self, target: &mut BoxGraph, host: &Address) -> Result<TransferOutcome, CoreError> {
        let index = target.pointer_hub(host).len() as i32;
        let options = TransferOptions::default()
            .with_parent(&[audio_unit::HOST], host.clone())
            .with_value(&[audio_unit::INDEX], Value::Int32(index));
        self.plan.apply(target, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use boxgraph_core::catalog::root;

    fn id(byte: u8) -> BoxId {
        BoxId::from_bytes([byte; 16])
    }

    fn project() -> BoxGraph {
        let mut graph = BoxGraph::new();
        graph
            .transact(|g| {
                g.create_box(BoxKind::Root, id(1), |_| {})?;
                g.create_box(BoxKind::AudioUnit, id(2), |b| {
                    b.refer(&[audio_unit::HOST], Address::new(id(1), &[root::AUDIO_UNITS]))
                        .set(&[audio_unit::LABEL], "Bass");
                })?;
                Ok(())
            })
            .unwrap();
        graph
    }

    #[test]
    fn header_is_checked_before_records() {
        let mut bytes = BytesMut::new();
        bytes.put_i32(0x4241_4421);
        bytes.put_i32(PRESET_VERSION);
        assert!(matches!(
            PresetDecoder::read(&bytes),
            Err(StorageError::Core(CoreError::InvalidMagic { .. }))
        ));

        let mut bytes = BytesMut::new();
        bytes.put_i32(PRESET_MAGIC);
        bytes.put_i32(PRESET_VERSION + 1);
        // garbage after the header is never looked at
        bytes.put_slice(&[0xff; 7]);
        assert!(matches!(
            PresetDecoder::read(&bytes),
            Err(StorageError::Core(CoreError::VersionMismatch { .. }))
        ));
    }

    #[test]
    fn empty_preset_is_rejected() {
        let mut bytes = BytesMut::new();
        codec::write_header(&mut bytes, PRESET_MAGIC, PRESET_VERSION);
        codec::write_records(&mut bytes, &[]);
        assert!(matches!(
            PresetDecoder::read(&bytes),
            Err(StorageError::EmptyPreset)
        ));
    }

    #[test]
    fn only_audio_units_are_encoded() {
        let graph = project();
        assert!(matches!(
            PresetEncoder::encode(&graph, id(1)),
            Err(StorageError::NotAnAudioUnit { .. })
        ));
        let bytes = PresetEncoder::encode(&graph, id(2)).unwrap();
        let preset = PresetDecoder::read(&bytes).unwrap();
        assert_eq!(preset.records().len(), 1);
        assert_eq!(preset.records()[0].kind, BoxKind::AudioUnit);
    }

    #[test]
    fn decode_appends_unit_to_host() {
        let source = project();
        let bytes = PresetEncoder::encode(&source, id(2)).unwrap();

        let mut target = project();
        let host = Address::new(id(1), &[root::AUDIO_UNITS]);
        target.begin_transaction().unwrap();
        let outcome = PresetDecoder::decode(&bytes, &mut target, &host).unwrap();
        target.end_transaction().unwrap();

        assert_eq!(target.pointer_hub(&host).len(), 2);
        assert_eq!(
            target.value(&Address::new(outcome.root, &[audio_unit::INDEX])),
            Some(&Value::Int32(1))
        );
        assert_eq!(
            target.value(&Address::new(outcome.root, &[audio_unit::LABEL])),
            Some(&Value::from("Bass"))
        );
    }
}
