//! Conversions between raw register words and engineering values.
//!
//! Everything here is pure; the access layer in [`crate::core`] feeds it
//! words read from the transport and sends back words it produced.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::registers::{RegisterDef, RegisterKind};

pub use tokio_modbus::{Address, Quantity};

/// 16-bit value stored in a Modbus register.
pub type Word = u16;

/// A decoded register value.
///
/// Serializes untagged: a JSON number, a string, or the
/// `{"bit0": …, "bit15": …}` object for bitfields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Bits(Bitfield16),
}

impl Value {
    /// Numeric view; `None` for strings and bitfields.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }
}

/// 16 independent flags carried by a single register word, `bit0` = LSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitfield16(pub Word);

impl Bitfield16 {
    pub fn bit(self, index: u8) -> bool {
        (self.0 >> index) & 1 == 1
    }
}

impl Serialize for Bitfield16 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(16))?;
        for index in 0..16u8 {
            map.serialize_entry(&format!("bit{index}"), &self.bit(index))?;
        }
        map.end()
    }
}

/// Decode raw `words` read from the device into the value described by `def`.
///
/// Two-word quantities combine big-endian, high word first. Numeric results
/// are divided by the descriptor's scale; strings and bitfields never scale.
pub fn decode(words: &[Word], def: &RegisterDef) -> Result<Value, Error> {
    let expected = def.kind.word_count();
    if words.len() != expected as usize {
        return Err(Error::WordCount {
            expected,
            got: words.len(),
        });
    }
    let raw = match def.kind {
        RegisterKind::Str(_) => return Ok(Value::Text(decode_text(words))),
        RegisterKind::Bitfield16 => return Ok(Value::Bits(Bitfield16(words[0]))),
        RegisterKind::U16 => f64::from(words[0]),
        RegisterKind::I16 => f64::from(words[0] as i16),
        RegisterKind::U32 => f64::from(combine(words[0], words[1])),
        RegisterKind::I32 => f64::from(combine(words[0], words[1]) as i32),
    };
    Ok(Value::Number(match def.scale {
        Some(scale) => raw / scale,
        None => raw,
    }))
}

/// Encode an engineering `value` into the words to write for `def`.
///
/// The range bound applies to the engineering value, before scaling. Scaled
/// values round half away from zero. Negative values truncate to their
/// two's-complement bit pattern; the transport treats every word as a raw
/// unsigned quantity.
pub fn encode(value: f64, def: &RegisterDef) -> Result<Vec<Word>, Error> {
    if let Some((min, max)) = def.range {
        if value < min || value > max {
            return Err(Error::OutOfRange { value, min, max });
        }
    }
    let raw = match def.scale {
        Some(scale) => (value * scale).round() as i64,
        None => value.round() as i64,
    };
    let words = match def.kind {
        // The catalog never marks a string register writable; reaching this
        // arm is a bug in the caller, not a device condition.
        RegisterKind::Str(_) => panic!("string registers cannot be encoded for writing"),
        RegisterKind::U16 | RegisterKind::I16 | RegisterKind::Bitfield16 => {
            vec![(raw & 0xFFFF) as Word]
        }
        RegisterKind::U32 | RegisterKind::I32 => {
            vec![((raw >> 16) & 0xFFFF) as Word, (raw & 0xFFFF) as Word]
        }
    };
    Ok(words)
}

/// Characters are packed two per word, high byte first; the device pads the
/// unused tail with NUL bytes, so decoding stops at the first NUL.
fn decode_text(words: &[Word]) -> String {
    let mut text = String::with_capacity(words.len() * 2);
    for byte in words.iter().copied().flat_map(u16::to_be_bytes) {
        if byte == 0 {
            break;
        }
        text.push(char::from(byte));
    }
    text
}

fn combine(high: Word, low: Word) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{control, telemetry, Access, RegisterDef, RegisterKind};

    fn plain(kind: RegisterKind) -> RegisterDef {
        RegisterDef {
            address: 0,
            kind,
            scale: None,
            unit: None,
            range: None,
            access: Access::ReadWrite,
            options: None,
        }
    }

    fn scaled(kind: RegisterKind, scale: f64) -> RegisterDef {
        RegisterDef {
            scale: Some(scale),
            ..plain(kind)
        }
    }

    #[test]
    fn i16_sign_boundaries() {
        let def = plain(RegisterKind::I16);
        assert_eq!(decode(&[0x7FFF], &def).unwrap(), Value::Number(32767.0));
        assert_eq!(decode(&[0x8000], &def).unwrap(), Value::Number(-32768.0));
        assert_eq!(decode(&[0xFFFF], &def).unwrap(), Value::Number(-1.0));
    }

    #[test]
    fn i32_sign_boundaries() {
        let def = plain(RegisterKind::I32);
        assert_eq!(
            decode(&[0x7FFF, 0xFFFF], &def).unwrap(),
            Value::Number(2147483647.0)
        );
        assert_eq!(
            decode(&[0x8000, 0x0000], &def).unwrap(),
            Value::Number(-2147483648.0)
        );
    }

    #[test]
    fn u32_combines_high_word_first() {
        let def = plain(RegisterKind::U32);
        assert_eq!(
            decode(&[0x0001, 0x0000], &def).unwrap(),
            Value::Number(65536.0)
        );
        assert_eq!(
            decode(&[0xFFFF, 0xFFFF], &def).unwrap(),
            Value::Number(4294967295.0)
        );
    }

    #[test]
    fn u16_stays_unsigned() {
        let def = plain(RegisterKind::U16);
        assert_eq!(decode(&[0xFFFF], &def).unwrap(), Value::Number(65535.0));
    }

    #[test]
    fn scale_divides_decoded_value() {
        // grid voltage resolution: raw 2500 at scale 10 is 250.0 V
        let def = scaled(RegisterKind::I16, 10.0);
        assert_eq!(decode(&[2500], &def).unwrap(), Value::Number(250.0));
    }

    #[test]
    fn bitfield_expands_lsb_first() {
        let def = plain(RegisterKind::Bitfield16);
        let Value::Bits(bits) = decode(&[0b0000_0000_0000_0101], &def).unwrap() else {
            panic!("expected bitfield");
        };
        for index in 0..16 {
            assert_eq!(bits.bit(index), index == 0 || index == 2, "bit{index}");
        }
    }

    #[test]
    fn bitfield_serializes_named_flags() {
        let json = serde_json::to_value(Bitfield16(0b1000_0000_0000_0001)).unwrap();
        assert_eq!(json["bit0"], true);
        assert_eq!(json["bit15"], true);
        assert_eq!(json["bit7"], false);
        assert_eq!(json.as_object().unwrap().len(), 16);
    }

    #[test]
    fn text_truncates_at_first_nul() {
        let def = plain(RegisterKind::Str(4));
        let words = [0x4142, 0x4300, 0x0000, 0x0000]; // "ABC" NUL-padded
        assert_eq!(decode(&words, &def).unwrap(), Value::Text("ABC".into()));
    }

    #[test]
    fn text_reads_high_byte_first() {
        let def = plain(RegisterKind::Str(1));
        assert_eq!(decode(&[0x4142], &def).unwrap(), Value::Text("AB".into()));
    }

    #[test]
    fn word_count_mismatch_is_rejected() {
        let def = plain(RegisterKind::U32);
        assert!(matches!(
            decode(&[1], &def),
            Err(Error::WordCount {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn encode_enforces_range_before_scaling() {
        match encode(5.0, &control::MIN_SOC).unwrap_err() {
            Error::OutOfRange { value, min, max } => {
                assert_eq!((value, min, max), (5.0, 10.0, 100.0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encode_scales_and_rounds() {
        let def = scaled(RegisterKind::I16, 10.0);
        assert_eq!(encode(20.5, &def).unwrap(), vec![205]);
        // half-values round away from zero in both directions
        assert_eq!(encode(0.25, &scaled(RegisterKind::I16, 10.0)).unwrap(), vec![3]);
        assert_eq!(
            encode(-0.25, &scaled(RegisterKind::I16, 10.0)).unwrap(),
            vec![0xFFFD]
        );
    }

    #[test]
    fn encode_truncates_negative_i16() {
        let def = plain(RegisterKind::I16);
        assert_eq!(encode(-1.0, &def).unwrap(), vec![0xFFFF]);
    }

    #[test]
    fn encode_splits_i32_high_word_first() {
        let def = plain(RegisterKind::I32);
        assert_eq!(encode(70000.0, &def).unwrap(), vec![0x0001, 0x1170]);
        assert_eq!(encode(-1.0, &def).unwrap(), vec![0xFFFF, 0xFFFF]);
    }

    #[test]
    #[should_panic(expected = "string registers")]
    fn encode_refuses_strings() {
        let _ = encode(0.0, &plain(RegisterKind::Str(4)));
    }

    #[test]
    fn writable_round_trips_within_rounding_error() {
        let samples = [
            (control::MIN_SOC, 42.0),
            (control::THRESHOLD_SOC, 0.0),
            (control::BATTERY_MAX_CHARGE_CURRENT, 16.5),
            (control::BATTERY_MAX_DISCHARGE_CURRENT, 25.9),
            (control::REMOTE_ACTIVE_POWER, -3500.0),
            (control::IMPORT_POWER_LIMIT, 70000.0),
            (control::WORK_MODE, 6.0),
        ];
        for (def, value) in samples {
            let words = encode(value, &def).unwrap();
            let decoded = decode(&words, &def).unwrap().as_f64().unwrap();
            let tolerance = def.scale.map_or(0.5, |scale| 0.5 / scale);
            assert!(
                (decoded - value).abs() <= tolerance,
                "{value} round-tripped to {decoded}"
            );
        }
    }

    #[test]
    fn value_serializes_untagged() {
        assert_eq!(serde_json::to_value(Value::Number(8.76)).unwrap(), 8.76);
        assert_eq!(
            serde_json::to_value(Value::Text("H3".into())).unwrap(),
            "H3"
        );
    }

    #[test]
    fn telemetry_scaling_matches_device_resolution() {
        // cumulative generation has 10 Wh resolution: raw 1234567 -> 12345.67 kWh
        let value = decode(&[0x0012, 0xD687], &telemetry::CUMULATIVE_GENERATION).unwrap();
        assert_eq!(value, Value::Number(12345.67));
    }
}
