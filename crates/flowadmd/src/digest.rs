//! Digest record decoding
//!
//! The device pushes telemetry as digest records: ordered lists of
//! fixed-width big-endian unsigned fields. Each record may batch several
//! independent field-sets; only the first set per poll is read. Decoding is
//! checked against a declared layout and never has side effects.

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{FlowAdmError, Result};
use crate::tables::{COUNT_DIGEST, WARM_UP_DIGEST};
use crate::types::{DigestEvent, Strategy};

/// One named fixed-width field of a digest layout
#[derive(Clone, Copy, Debug)]
pub struct DigestField {
    pub name: &'static str,
    pub bits: u32,
}

/// Declared schema of a digest channel: ordered named big-endian fields
#[derive(Clone, Copy, Debug)]
pub struct DigestLayout {
    pub digest_name: &'static str,
    pub fields: &'static [DigestField],
}

/// Layout of the `reported_data` channel: `[passed:32, blocked:32]`
pub const COUNT_LAYOUT: DigestLayout = DigestLayout {
    digest_name: COUNT_DIGEST,
    fields: &[
        DigestField { name: "passed", bits: 32 },
        DigestField { name: "blocked", bits: 32 },
    ],
};

/// Layout of the `warm_up_data` channel:
/// `[threshold:32, passed:32, blocked:32]`
pub const WARM_UP_LAYOUT: DigestLayout = DigestLayout {
    digest_name: WARM_UP_DIGEST,
    fields: &[
        DigestField { name: "threshold", bits: 32 },
        DigestField { name: "passed", bits: 32 },
        DigestField { name: "blocked", bits: 32 },
    ],
};

impl DigestLayout {
    /// Layout a strategy's digest channel uses
    pub fn for_strategy(strategy: Strategy) -> &'static DigestLayout {
        match strategy {
            Strategy::Direct => &COUNT_LAYOUT,
            Strategy::WarmUp => &WARM_UP_LAYOUT,
        }
    }

    /// Decodes one field-set into integers in declared order.
    ///
    /// Fails with `MalformedDigest` if the buffer count or any buffer width
    /// does not match the layout.
    pub fn decode(&self, buffers: &[Vec<u8>]) -> Result<Vec<u64>> {
        if buffers.len() != self.fields.len() {
            return Err(FlowAdmError::MalformedDigest(format!(
                "{}: expected {} fields, got {}",
                self.digest_name,
                self.fields.len(),
                buffers.len()
            )));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for (field, buf) in self.fields.iter().zip(buffers) {
            let width = (field.bits as usize).div_ceil(8);
            if buf.len() != width {
                return Err(FlowAdmError::MalformedDigest(format!(
                    "{}: field {} expected {} bytes, got {}",
                    self.digest_name,
                    field.name,
                    width,
                    buf.len()
                )));
            }
            let value = buf
                .as_slice()
                .read_uint::<BigEndian>(width)
                .map_err(|e| {
                    FlowAdmError::MalformedDigest(format!(
                        "{}: field {}: {}",
                        self.digest_name, field.name, e
                    ))
                })?;
            values.push(value);
        }
        Ok(values)
    }
}

/// One field-set of a digest record: raw byte buffers, one per field
pub type DigestEntry = Vec<Vec<u8>>;

/// Raw digest record as delivered by the device
#[derive(Clone, Debug)]
pub struct DigestRecord {
    /// Name of the digest channel the record arrived on
    pub digest_name: String,
    /// Batched field-sets; only the first is consumed per poll
    pub entries: Vec<DigestEntry>,
}

impl DigestEvent {
    /// Decodes the first field-set of a record for the given strategy
    pub fn decode(strategy: Strategy, entry: &[Vec<u8>]) -> Result<DigestEvent> {
        let values = DigestLayout::for_strategy(strategy).decode(entry)?;
        Ok(match strategy {
            Strategy::Direct => DigestEvent::Count {
                passed: values[0],
                blocked: values[1],
            },
            Strategy::WarmUp => DigestEvent::Threshold {
                threshold: values[0],
                passed: values[1],
                blocked: values[2],
            },
        })
    }
}
