// Artifact persistence: versioned binary layout with atomic writes
//
// Layout (little-endian):
//   magic  "JPRA"      4 bytes
//   version u16        currently 1
//   kind    u8         1 = histogram (f32), 2 = chords (u8), 3 = index-roll (i16)
//   ndim    u8
//   dims    ndim x u64
//   payload            row-major elements
//
// Tempo-normalized MIDI is written as a plain Standard MIDI File.

use ndarray::Array2;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::features::{Chord, IndexRoll, PITCH_CLASSES};

pub const MAGIC: &[u8; 4] = b"JPRA";
pub const FORMAT_VERSION: u16 = 1;

/// Sentinel stored for a silent index-roll step
pub const SILENCE_ID: i16 = -1;

const KIND_HISTOGRAM: u8 = 1;
const KIND_CHORDS: u8 = 2;
const KIND_INDEX_ROLL: u8 = 3;

/// One stage output, ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Encoded Standard MIDI File
    Midi(Vec<u8>),
    /// `[12, bars]` pitch-class histogram
    Histogram(Array2<f32>),
    /// One chord of `chord_size` classes per bar
    Chords { chord_size: usize, chords: Vec<Chord> },
    /// Melody index-roll, `None` = silence
    IndexRoll(IndexRoll),
}

impl Artifact {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Artifact::Midi(_) => "midi",
            Artifact::Histogram(_) => "histogram",
            Artifact::Chords { .. } => "chords",
            Artifact::IndexRoll(_) => "index-roll",
        }
    }

    /// Serialize into the on-disk representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Artifact::Midi(bytes) => Ok(bytes.clone()),
            Artifact::Histogram(histogram) => {
                let dims = [histogram.nrows() as u64, histogram.ncols() as u64];
                let mut out = header(KIND_HISTOGRAM, &dims, histogram.len() * 4);
                // Logical iteration order is row-major regardless of memory layout
                for value in histogram.iter() {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                Ok(out)
            }
            Artifact::Chords { chord_size, chords } => {
                if let Some(bad) = chords.iter().find(|c| c.len() != *chord_size) {
                    return Err(PipelineError::Shape(format!(
                        "chord {:?} does not have {} classes",
                        bad, chord_size
                    )));
                }
                let dims = [chords.len() as u64, *chord_size as u64];
                let mut out = header(KIND_CHORDS, &dims, chords.len() * chord_size);
                for chord in chords {
                    out.extend_from_slice(chord);
                }
                Ok(out)
            }
            Artifact::IndexRoll(roll) => {
                let dims = [roll.len() as u64];
                let mut out = header(KIND_INDEX_ROLL, &dims, roll.len() * 2);
                for step in roll {
                    let id = step.map_or(SILENCE_ID, i16::from);
                    out.extend_from_slice(&id.to_le_bytes());
                }
                Ok(out)
            }
        }
    }

    /// Parse the on-disk representation. Anything starting with `MThd` is
    /// taken to be MIDI.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.starts_with(b"MThd") {
            return Ok(Artifact::Midi(data.to_vec()));
        }

        let mut reader = ByteReader { data, pos: 0 };
        if reader.take(4)? != MAGIC {
            return Err(PipelineError::Artifact("missing artifact magic".into()));
        }
        let version = u16::from_le_bytes(reader.array()?);
        if version != FORMAT_VERSION {
            return Err(PipelineError::Artifact(format!(
                "unsupported artifact version {}",
                version
            )));
        }
        let [kind] = reader.array::<1>()?;
        let [ndim] = reader.array::<1>()?;
        let mut dims = Vec::with_capacity(ndim as usize);
        for _ in 0..ndim {
            let dim = u64::from_le_bytes(reader.array()?);
            dims.push(usize::try_from(dim).map_err(|_| {
                PipelineError::Artifact(format!("dimension {} too large", dim))
            })?);
        }

        match (kind, dims.as_slice()) {
            (KIND_HISTOGRAM, &[rows, cols]) => {
                let payload = reader.payload(rows.checked_mul(cols), 4)?;
                let values = payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(Artifact::Histogram(Array2::from_shape_vec((rows, cols), values)?))
            }
            (KIND_CHORDS, &[bars, chord_size]) => {
                if chord_size == 0 || chord_size > PITCH_CLASSES {
                    return Err(PipelineError::Artifact(format!(
                        "chord size {} outside 1..={}",
                        chord_size, PITCH_CLASSES
                    )));
                }
                let payload = reader.payload(bars.checked_mul(chord_size), 1)?;
                let chords = payload.chunks_exact(chord_size).map(<[u8]>::to_vec).collect();
                Ok(Artifact::Chords { chord_size, chords })
            }
            (KIND_INDEX_ROLL, &[steps]) => {
                let payload = reader.payload(Some(steps), 2)?;
                let roll = payload
                    .chunks_exact(2)
                    .map(|c| {
                        let id = i16::from_le_bytes([c[0], c[1]]);
                        u8::try_from(id).ok()
                    })
                    .collect();
                Ok(Artifact::IndexRoll(roll))
            }
            _ => Err(PipelineError::Artifact(format!(
                "unknown artifact kind {} with {} dimensions",
                kind, ndim
            ))),
        }
    }

    pub fn into_histogram(self) -> Result<Array2<f32>> {
        match self {
            Artifact::Histogram(histogram) => Ok(histogram),
            other => Err(unexpected_kind("histogram", &other)),
        }
    }

    pub fn into_chords(self) -> Result<Vec<Chord>> {
        match self {
            Artifact::Chords { chords, .. } => Ok(chords),
            other => Err(unexpected_kind("chords", &other)),
        }
    }

    pub fn into_index_roll(self) -> Result<IndexRoll> {
        match self {
            Artifact::IndexRoll(roll) => Ok(roll),
            other => Err(unexpected_kind("index-roll", &other)),
        }
    }
}

/// Write an artifact so that `path` either holds the complete artifact or
/// is left untouched: bytes go to a sibling temp file that is renamed over
/// `path` once fully written.
pub fn write_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    let bytes = artifact.to_bytes()?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::Artifact(format!("invalid artifact path {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = std::fs::write(&temp_path, &bytes).and_then(|_| std::fs::rename(&temp_path, path)) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Read an artifact written by [`write_artifact`].
pub fn read_artifact(path: &Path) -> Result<Artifact> {
    let data = std::fs::read(path)?;
    Artifact::from_bytes(&data)
}

fn header(kind: u8, dims: &[u64], payload_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + dims.len() * 8 + payload_len);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(kind);
    out.push(dims.len() as u8);
    for dim in dims {
        out.extend_from_slice(&dim.to_le_bytes());
    }
    out
}

fn unexpected_kind(expected: &str, found: &Artifact) -> PipelineError {
    PipelineError::Artifact(format!("expected {} artifact, found {}", expected, found.kind_name()))
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| PipelineError::Artifact("artifact is truncated".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Remaining bytes, which must hold exactly `count` elements
    fn payload(&mut self, count: Option<usize>, elem_size: usize) -> Result<&'a [u8]> {
        let len = count
            .and_then(|c| c.checked_mul(elem_size))
            .ok_or_else(|| PipelineError::Artifact("artifact dimensions overflow".into()))?;
        let payload = self.take(len)?;
        if self.pos != self.data.len() {
            return Err(PipelineError::Artifact(format!(
                "{} trailing bytes after payload",
                self.data.len() - self.pos
            )));
        }
        Ok(payload)
    }
}
