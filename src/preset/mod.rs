//! Declarative parameter definitions and persistence documents.
//!
//! Two jobs live here. Ingestion: a declarative list of [`ParamSpec`]s
//! (typically parsed from a definition file by the caller) becomes the
//! processor's [`ParamConfig`] set, with malformed definitions surfacing as
//! a hard [`DefinitionError`], since a processor cannot run with a partial
//! parameter set. Persistence: plain state documents for modulators and
//! the matrix that serialize through `serde` (behind the `serde` feature)
//! and double as the carrier for hot-swap state hand-over.

use crate::dsp::shape::LfoShape;
use crate::dsp::smooth::SmoothingKind;
use crate::modulation::lfo::LfoRate;
use crate::modulation::matrix::SourceId;
use crate::modulation::ModulatorKind;
use crate::param::config::{ModApply, ModeConfig, ParamConfig, ParamId};
use crate::param::range::{ParamRange, RangeDefect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Declarative description of one parameter mode.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSpec {
    pub name: String,
    pub unit: String,
    pub range: ParamRange,
    pub smoothing: SmoothingKind,
    pub apply: ModApply,
}

impl ModeSpec {
    pub fn new(name: impl Into<String>, range: ParamRange) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            range,
            smoothing: SmoothingKind::default(),
            apply: ModApply::default(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingKind) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_apply(mut self, apply: ModApply) -> Self {
        self.apply = apply;
        self
    }
}

/// Declarative description of one parameter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub id: ParamId,
    pub name: String,
    /// Default in the first mode's domain. `None` uses the range's natural
    /// default (0 dB for decibel ranges, a quarter note for sync).
    pub default: Option<f32>,
    pub modes: Vec<ModeSpec>,
}

impl ParamSpec {
    pub fn new(id: ParamId, name: impl Into<String>, mode: ModeSpec) -> Self {
        Self {
            id,
            name: name.into(),
            default: None,
            modes: vec![mode],
        }
    }

    pub fn with_default(mut self, default: f32) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_mode(mut self, mode: ModeSpec) -> Self {
        self.modes.push(mode);
        self
    }
}

/// Why a definition set was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionError {
    /// The definition list was empty.
    EmptySet,
    /// Two definitions share an id.
    DuplicateId(ParamId),
    /// A definition declared no modes.
    NoModes(ParamId),
    /// A mode's range failed validation.
    InvalidRange { id: ParamId, defect: RangeDefect },
}

impl core::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DefinitionError::EmptySet => write!(f, "parameter definition list is empty"),
            DefinitionError::DuplicateId(id) => {
                write!(f, "duplicate parameter id {}", id.0)
            }
            DefinitionError::NoModes(id) => {
                write!(f, "parameter id {} declares no modes", id.0)
            }
            DefinitionError::InvalidRange { id, defect } => {
                write!(f, "parameter id {}: {}", id.0, defect)
            }
        }
    }
}

impl std::error::Error for DefinitionError {}

/// Build the immutable config set from declarative definitions.
///
/// Fails hard on malformed input rather than silently defaulting; defaults
/// that merely fall outside their range are clamped (a domain error, not a
/// configuration error).
pub fn build_configs(specs: &[ParamSpec]) -> Result<Vec<ParamConfig>, DefinitionError> {
    if specs.is_empty() {
        return Err(DefinitionError::EmptySet);
    }

    let mut configs = Vec::with_capacity(specs.len());
    for spec in specs {
        if specs.iter().filter(|other| other.id == spec.id).count() > 1 {
            return Err(DefinitionError::DuplicateId(spec.id));
        }
        if spec.modes.is_empty() {
            return Err(DefinitionError::NoModes(spec.id));
        }
        for mode in &spec.modes {
            mode.range
                .validate()
                .map_err(|defect| DefinitionError::InvalidRange { id: spec.id, defect })?;
        }

        let first = &spec.modes[0];
        let default = first
            .range
            .clamp(spec.default.unwrap_or_else(|| first.range.default_value()));

        let mut config = ParamConfig::new(spec.id, spec.name.clone(), default, mode_config(first));
        for mode in &spec.modes[1..] {
            config = config.with_mode(mode_config(mode));
        }
        configs.push(config);
    }
    Ok(configs)
}

fn mode_config(spec: &ModeSpec) -> ModeConfig {
    ModeConfig::new(spec.name.clone(), spec.range)
        .with_unit(spec.unit.clone())
        .with_smoothing(spec.smoothing)
        .with_apply(spec.apply)
}

/// Settings document for one modulator.
///
/// A single flat document shared by every variant; each variant reads and
/// writes only the fields it owns, which is what lets a hot swap carry
/// settings across a kind change.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulatorState {
    pub kind: ModulatorKind,
    pub bipolar: bool,
    // LFO fields
    pub shape: LfoShape,
    pub rate: LfoRate,
    // Envelope fields
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub sustain: f32,
    pub release_ms: f32,
    // Macro fields
    pub level: f32,
}

impl Default for ModulatorState {
    fn default() -> Self {
        Self {
            kind: ModulatorKind::Lfo,
            bipolar: true,
            shape: LfoShape::default(),
            rate: LfoRate::default(),
            attack_ms: 10.0,
            decay_ms: 100.0,
            sustain: 0.7,
            release_ms: 300.0,
            level: 0.0,
        }
    }
}

/// One modulation-matrix routing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSpec {
    pub source: SourceId,
    pub target: ParamId,
    /// Contribution scale in normalized units of the target span.
    pub depth: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    /// Whether the source's signed output is used as-is.
    pub bipolar: bool,
}

impl ConnectionSpec {
    pub fn new(source: SourceId, target: ParamId, depth: f32) -> Self {
        Self {
            source,
            target,
            depth,
            attack_ms: 0.0,
            release_ms: 0.0,
            bipolar: true,
        }
    }

    /// Rectify/offset the source into [0, 1] before scaling.
    pub fn unipolar(mut self) -> Self {
        self.bipolar = false;
        self
    }

    pub fn with_times(mut self, attack_ms: f32, release_ms: f32) -> Self {
        self.attack_ms = attack_ms.max(0.0);
        self.release_ms = release_ms.max(0.0);
        self
    }
}

/// Snapshot of one modulator slot for persistence.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceState {
    pub id: SourceId,
    pub state: ModulatorState,
}

/// The full matrix as a document.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatrixState {
    pub entries: Vec<ConnectionSpec>,
}

/// One parameter's persisted value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValueState {
    pub id: ParamId,
    pub normalized: f32,
}

/// Everything the control surface persists for a preset.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresetState {
    pub params: Vec<ParamValueState>,
    pub sources: Vec<SourceState>,
    pub matrix: MatrixState,
}
