//! The application's box catalog.
//!
//! [`BoxKind`] and [`PointerType`] are closed enums; every kind maps to one
//! static [`BoxSchema`] in this file. Per-kind modules expose the field keys
//! as constants so callers address fields by name instead of by number.

use serde::{Deserialize, Serialize};

use crate::schema::{
    array, boolean, float32, hub, int32, object, pointer, text, BoxSchema, FieldSchema,
    PointerRules, Resource,
};

/// Tag carried by every pointer field. Targets list the tags they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointerType {
    /// AudioUnit -> Root.audio_units
    AudioUnitHost,
    /// Track -> AudioUnit.tracks
    TrackCollection,
    /// AudioRegion -> Track.regions
    RegionCollection,
    /// AudioRegion -> AudioFile
    AudioFile,
    /// AudioConnection -> AudioUnit.output / AudioUnit.input
    AudioConnection,
    /// AudioUnit -> AudioBus.input
    AudioOutput,
    /// Device -> AudioUnit.midi_effects
    DeviceHost,
}

/// Every box kind known to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoxKind {
    Root = 0,
    AudioUnit = 1,
    AudioBus = 2,
    Track = 3,
    AudioRegion = 4,
    AudioFile = 5,
    AudioConnection = 6,
    StepSequencer = 7,
}

impl BoxKind {
    pub const ALL: [BoxKind; 8] = [
        BoxKind::Root,
        BoxKind::AudioUnit,
        BoxKind::AudioBus,
        BoxKind::Track,
        BoxKind::AudioRegion,
        BoxKind::AudioFile,
        BoxKind::AudioConnection,
        BoxKind::StepSequencer,
    ];

    /// The static schema for this kind.
    pub fn schema(self) -> &'static BoxSchema {
        match self {
            BoxKind::Root => &ROOT,
            BoxKind::AudioUnit => &AUDIO_UNIT,
            BoxKind::AudioBus => &AUDIO_BUS,
            BoxKind::Track => &TRACK,
            BoxKind::AudioRegion => &AUDIO_REGION,
            BoxKind::AudioFile => &AUDIO_FILE,
            BoxKind::AudioConnection => &AUDIO_CONNECTION,
            BoxKind::StepSequencer => &STEP_SEQUENCER,
        }
    }

    /// Stable numeric key used in serialized records.
    pub fn key(self) -> u16 {
        self as u16
    }

    pub fn from_key(key: u16) -> Option<BoxKind> {
        BoxKind::ALL.iter().copied().find(|kind| kind.key() == key)
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn resource(self) -> Resource {
        self.schema().resource
    }
}

// ---------------------------------------------------------------------------
// Field keys
// ---------------------------------------------------------------------------

pub mod root {
    use crate::address::FieldKey;

    pub const AUDIO_UNITS: FieldKey = 1;
    pub const NAME: FieldKey = 2;
    pub const BPM: FieldKey = 3;
}

pub mod audio_unit {
    use crate::address::FieldKey;

    pub const HOST: FieldKey = 1;
    pub const INDEX: FieldKey = 2;
    pub const VOLUME: FieldKey = 3;
    pub const MUTE: FieldKey = 4;
    pub const TRACKS: FieldKey = 5;
    pub const INPUT: FieldKey = 6;
    pub const OUTPUT: FieldKey = 7;
    pub const MIDI_EFFECTS: FieldKey = 8;
    pub const LABEL: FieldKey = 9;
    pub const OUTPUT_BUS: FieldKey = 10;
}

pub mod audio_bus {
    use crate::address::FieldKey;

    pub const INPUT: FieldKey = 1;
    pub const LABEL: FieldKey = 2;
}

pub mod track {
    use crate::address::FieldKey;

    pub const AUDIO_UNIT: FieldKey = 1;
    pub const REGIONS: FieldKey = 2;
    pub const INDEX: FieldKey = 3;
    pub const ENABLED: FieldKey = 4;
}

pub mod audio_region {
    use crate::address::FieldKey;

    pub const REGIONS: FieldKey = 1;
    pub const FILE: FieldKey = 2;
    pub const POSITION: FieldKey = 3;
    pub const DURATION: FieldKey = 4;
    pub const LABEL: FieldKey = 5;
    pub const MUTE: FieldKey = 6;
}

pub mod audio_file {
    use crate::address::FieldKey;

    pub const FILE_NAME: FieldKey = 1;
    pub const START_IN_SECONDS: FieldKey = 2;
    pub const END_IN_SECONDS: FieldKey = 3;
}

pub mod audio_connection {
    use crate::address::FieldKey;

    pub const SOURCE: FieldKey = 1;
    pub const TARGET: FieldKey = 2;
    pub const GAIN: FieldKey = 3;
}

pub mod step_sequencer {
    use crate::address::FieldKey;

    pub const HOST: FieldKey = 1;
    pub const ENABLED: FieldKey = 2;
    pub const PATTERNS: FieldKey = 3;

    pub const PATTERN_COUNT: u16 = 16;
    pub const STEP_COUNT: u16 = 16;

    pub mod pattern {
        use crate::address::FieldKey;

        pub const STEPS: FieldKey = 1;
        pub const LENGTH: FieldKey = 2;
    }

    pub mod step {
        use crate::address::FieldKey;

        pub const GATE: FieldKey = 1;
        pub const VELOCITY: FieldKey = 2;
        pub const SEMITONE: FieldKey = 3;
    }
}

// ---------------------------------------------------------------------------
// Schema tables
// ---------------------------------------------------------------------------

static ROOT_FIELDS: [FieldSchema; 3] = [
    hub(
        root::AUDIO_UNITS,
        "audio_units",
        PointerRules::accepts(&[PointerType::AudioUnitHost]),
    ),
    text(root::NAME, "name", "Untitled"),
    float32(root::BPM, "bpm", 120.0),
];

static ROOT: BoxSchema = BoxSchema {
    kind: BoxKind::Root,
    name: "Root",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &ROOT_FIELDS,
};

static AUDIO_UNIT_FIELDS: [FieldSchema; 10] = [
    pointer(
        audio_unit::HOST,
        "host",
        PointerType::AudioUnitHost,
        true,
    ),
    int32(audio_unit::INDEX, "index", 0),
    float32(audio_unit::VOLUME, "volume", 0.0),
    boolean(audio_unit::MUTE, "mute", false),
    hub(
        audio_unit::TRACKS,
        "tracks",
        PointerRules::accepts(&[PointerType::TrackCollection]),
    ),
    hub(
        audio_unit::INPUT,
        "input",
        PointerRules::accepts(&[PointerType::AudioConnection]).exclusive(),
    ),
    hub(
        audio_unit::OUTPUT,
        "output",
        PointerRules::accepts(&[PointerType::AudioConnection]),
    ),
    hub(
        audio_unit::MIDI_EFFECTS,
        "midi_effects",
        PointerRules::accepts(&[PointerType::DeviceHost]),
    ),
    text(audio_unit::LABEL, "label", "Instrument"),
    pointer(
        audio_unit::OUTPUT_BUS,
        "output_bus",
        PointerType::AudioOutput,
        false,
    ),
];

static AUDIO_UNIT: BoxSchema = BoxSchema {
    kind: BoxKind::AudioUnit,
    name: "AudioUnit",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &AUDIO_UNIT_FIELDS,
};

static AUDIO_BUS_FIELDS: [FieldSchema; 2] = [
    hub(
        audio_bus::INPUT,
        "input",
        PointerRules::accepts(&[PointerType::AudioOutput]).mandatory(),
    ),
    text(audio_bus::LABEL, "label", "Bus"),
];

static AUDIO_BUS: BoxSchema = BoxSchema {
    kind: BoxKind::AudioBus,
    name: "AudioBus",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &AUDIO_BUS_FIELDS,
};

static TRACK_FIELDS: [FieldSchema; 4] = [
    pointer(
        track::AUDIO_UNIT,
        "audio_unit",
        PointerType::TrackCollection,
        true,
    ),
    hub(
        track::REGIONS,
        "regions",
        PointerRules::accepts(&[PointerType::RegionCollection]),
    ),
    int32(track::INDEX, "index", 0),
    boolean(track::ENABLED, "enabled", true),
];

static TRACK: BoxSchema = BoxSchema {
    kind: BoxKind::Track,
    name: "Track",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &TRACK_FIELDS,
};

static AUDIO_REGION_FIELDS: [FieldSchema; 6] = [
    pointer(
        audio_region::REGIONS,
        "regions",
        PointerType::RegionCollection,
        true,
    ),
    pointer(audio_region::FILE, "file", PointerType::AudioFile, true),
    int32(audio_region::POSITION, "position", 0),
    int32(audio_region::DURATION, "duration", 0),
    text(audio_region::LABEL, "label", ""),
    boolean(audio_region::MUTE, "mute", false),
];

static AUDIO_REGION: BoxSchema = BoxSchema {
    kind: BoxKind::AudioRegion,
    name: "AudioRegion",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &AUDIO_REGION_FIELDS,
};

static AUDIO_FILE_FIELDS: [FieldSchema; 3] = [
    text(audio_file::FILE_NAME, "file_name", ""),
    float32(audio_file::START_IN_SECONDS, "start_in_seconds", 0.0),
    float32(audio_file::END_IN_SECONDS, "end_in_seconds", 0.0),
];

static AUDIO_FILE: BoxSchema = BoxSchema {
    kind: BoxKind::AudioFile,
    name: "AudioFile",
    resource: Resource::Preserved,
    rules: PointerRules::accepts(&[PointerType::AudioFile]),
    fields: &AUDIO_FILE_FIELDS,
};

static AUDIO_CONNECTION_FIELDS: [FieldSchema; 3] = [
    pointer(
        audio_connection::SOURCE,
        "source",
        PointerType::AudioConnection,
        true,
    ),
    pointer(
        audio_connection::TARGET,
        "target",
        PointerType::AudioConnection,
        true,
    ),
    float32(audio_connection::GAIN, "gain", 1.0),
];

static AUDIO_CONNECTION: BoxSchema = BoxSchema {
    kind: BoxKind::AudioConnection,
    name: "AudioConnection",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &AUDIO_CONNECTION_FIELDS,
};

static STEP_FIELDS: [FieldSchema; 3] = [
    boolean(step_sequencer::step::GATE, "gate", false),
    float32(step_sequencer::step::VELOCITY, "velocity", 0.8),
    int32(step_sequencer::step::SEMITONE, "semitone", 0),
];

static STEP: FieldSchema = object(0, "step", &STEP_FIELDS);

static PATTERN_FIELDS: [FieldSchema; 2] = [
    array(
        step_sequencer::pattern::STEPS,
        "steps",
        step_sequencer::STEP_COUNT,
        &STEP,
    ),
    int32(
        step_sequencer::pattern::LENGTH,
        "length",
        step_sequencer::STEP_COUNT as i32,
    ),
];

static PATTERN: FieldSchema = object(0, "pattern", &PATTERN_FIELDS);

static STEP_SEQUENCER_FIELDS: [FieldSchema; 3] = [
    pointer(
        step_sequencer::HOST,
        "host",
        PointerType::DeviceHost,
        true,
    ),
    boolean(step_sequencer::ENABLED, "enabled", true),
    array(
        step_sequencer::PATTERNS,
        "patterns",
        step_sequencer::PATTERN_COUNT,
        &PATTERN,
    ),
];

static STEP_SEQUENCER: BoxSchema = BoxSchema {
    kind: BoxKind::StepSequencer,
    name: "StepSequencer",
    resource: Resource::Transient,
    rules: PointerRules::NONE,
    fields: &STEP_SEQUENCER_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    #[test]
    fn kind_keys_roundtrip() {
        for kind in BoxKind::ALL {
            assert_eq!(BoxKind::from_key(kind.key()), Some(kind));
            assert_eq!(kind.schema().kind, kind);
        }
        assert_eq!(BoxKind::from_key(999), None);
    }

    #[test]
    fn field_keys_are_unique_per_box() {
        for kind in BoxKind::ALL {
            let mut keys: Vec<_> = kind.schema().fields.iter().map(|f| f.key).collect();
            let total = keys.len();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), total, "duplicate field key in {}", kind.name());
        }
    }

    #[test]
    fn only_audio_files_are_preserved() {
        let preserved: Vec<_> = BoxKind::ALL
            .iter()
            .filter(|k| k.resource() == Resource::Preserved)
            .collect();
        assert_eq!(preserved, vec![&BoxKind::AudioFile]);
    }

    #[test]
    fn every_pointer_type_has_a_target() {
        fn accepted(fields: &'static [FieldSchema], out: &mut Vec<PointerType>) {
            for field in fields {
                out.extend_from_slice(field.rules.accepts);
                if let FieldKind::Object { fields } = field.kind {
                    accepted(fields, out);
                }
            }
        }
        let mut all = Vec::new();
        for kind in BoxKind::ALL {
            all.extend_from_slice(kind.schema().rules.accepts);
            accepted(kind.schema().fields, &mut all);
        }
        for pointer_type in [
            PointerType::AudioUnitHost,
            PointerType::TrackCollection,
            PointerType::RegionCollection,
            PointerType::AudioFile,
            PointerType::AudioConnection,
            PointerType::AudioOutput,
            PointerType::DeviceHost,
        ] {
            assert!(all.contains(&pointer_type), "{:?} has no target", pointer_type);
        }
    }
}
