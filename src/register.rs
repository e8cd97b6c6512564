use std::collections::BTreeMap;
use std::fmt;

/// Decoded field values keyed by field name, rounded to 2 decimal places.
pub type Fields = BTreeMap<&'static str, f64>;

// treat binary values this close to x.xx5 as exactly half-way
const HALF_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{block} block: expected {expected} registers, got {actual}")]
    WrongLength {
        block: BlockType,
        expected: usize,
        actual: usize,
    },
}

/// One named value inside a register block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledField {
    pub name: &'static str,
    pub offset: usize,
    pub signed: bool,
    pub scale: f64,
}

impl ScaledField {
    const fn unsigned(name: &'static str, offset: usize, scale: f64) -> Self {
        Self { name, offset, signed: false, scale }
    }

    const fn signed(name: &'static str, offset: usize, scale: f64) -> Self {
        Self { name, offset, signed: true, scale }
    }

    /// Converts one raw register into its physical value, before rounding.
    pub fn apply(&self, raw: u16) -> f64 {
        let value = if self.signed {
            f64::from(raw as i16)
        } else {
            f64::from(raw)
        };

        value * self.scale
    }
}

// SYSTEM {{{
const SYSTEM_START: u16 = 800;
const SYSTEM_COUNT: u16 = 27;

const SYSTEM_FIELDS: [ScaledField; 13] = [
    ScaledField::unsigned("PV - AC-coupled on output L1", 8, 1.0),
    ScaledField::unsigned("PV - AC-coupled on output L2", 9, 1.0),
    ScaledField::unsigned("PV - AC-coupled on output L3", 10, 1.0),
    ScaledField::unsigned("PV - AC-coupled on input L1", 11, 1.0),
    ScaledField::unsigned("PV - AC-coupled on input L2", 12, 1.0),
    ScaledField::unsigned("PV - AC-coupled on input L3", 13, 1.0),
    ScaledField::unsigned("AC Consumption L1", 17, 1.0),
    ScaledField::unsigned("AC Consumption L2", 18, 1.0),
    ScaledField::unsigned("AC Consumption L3", 19, 1.0),
    ScaledField::signed("Grid L1", 20, 1.0),
    ScaledField::signed("Grid L2", 21, 1.0),
    ScaledField::signed("Grid L3", 22, 1.0),
    ScaledField::unsigned("Active input source", 26, 1.0),
]; // }}}

// BATTERY {{{
const BATTERY_START: u16 = 840;
const BATTERY_COUNT: u16 = 7;

const BATTERY_FIELDS: [ScaledField; 6] = [
    ScaledField::unsigned("Battery Voltage", 0, 0.1),
    ScaledField::signed("Battery Current", 1, 0.1),
    ScaledField::signed("Battery Power", 2, 1.0),
    ScaledField::unsigned("Battery State of Charge", 3, 1.0),
    ScaledField::unsigned("Battery State", 4, 1.0),
    ScaledField::unsigned("Battery Time to Go", 6, 1.0),
]; // }}}

const fn offsets_fit(fields: &[ScaledField], count: u16) -> bool {
    let mut i = 0;
    while i < fields.len() {
        if fields[i].offset >= count as usize {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    offsets_fit(&SYSTEM_FIELDS, SYSTEM_COUNT),
    "SYSTEM field offset outside of block"
);
const _: () = assert!(
    offsets_fit(&BATTERY_FIELDS, BATTERY_COUNT),
    "BATTERY field offset outside of block"
);

/// The register blocks read from the Venus device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    System,
    Battery,
}

impl BlockType {
    /// Blocks in the order they are polled.
    pub const ALL: [BlockType; 2] = [BlockType::System, BlockType::Battery];

    pub fn start(&self) -> u16 {
        match self {
            Self::System => SYSTEM_START,
            Self::Battery => BATTERY_START,
        }
    }

    pub fn count(&self) -> u16 {
        match self {
            Self::System => SYSTEM_COUNT,
            Self::Battery => BATTERY_COUNT,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Battery => "battery",
        }
    }

    pub fn fields(&self) -> &'static [ScaledField] {
        match self {
            Self::System => &SYSTEM_FIELDS,
            Self::Battery => &BATTERY_FIELDS,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::System => write!(f, "SYSTEM"),
            Self::Battery => write!(f, "BATTERY"),
        }
    }
}

/// Decodes a raw register block into named, scaled values.
///
/// `raw` must hold exactly `block.count()` registers, starting at
/// `block.start()`. Anything else is rejected as a whole; no partial
/// mapping is ever returned.
pub fn decode(block: BlockType, raw: &[u16]) -> Result<Fields, DecodeError> {
    let expected = block.count() as usize;
    if raw.len() != expected {
        return Err(DecodeError::WrongLength {
            block,
            expected,
            actual: raw.len(),
        });
    }

    Ok(block
        .fields()
        .iter()
        .map(|field| (field.name, round2(field.apply(raw[field.offset]))))
        .collect())
}

/// Rounds to 2 decimal places, half away from zero (`%.2f` style).
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    let fraction = (scaled - scaled.trunc()).abs();

    let rounded = if (fraction - 0.5).abs() < HALF_EPSILON {
        scaled.trunc() + scaled.signum()
    } else {
        scaled.round()
    };

    rounded / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_block() -> Vec<u16> {
        let mut raw = vec![0; 17];
        raw.extend_from_slice(&[100, 200, 300, 65535, 65534, 65533, 0, 0, 0, 1]);
        raw
    }

    fn is_two_decimals(value: f64) -> bool {
        round2(value) == value && value.is_finite()
    }

    #[test]
    fn system_block_has_thirteen_fields() {
        let fields = decode(BlockType::System, &[0xffff; 27]).unwrap();

        assert_eq!(fields.len(), 13);
        assert!(fields.values().all(|v| is_two_decimals(*v)));
    }

    #[test]
    fn battery_block_has_six_fields() {
        let fields = decode(BlockType::Battery, &[1234, 65000, 40000, 87, 2, 0, 1800]).unwrap();

        assert_eq!(fields.len(), 6);
        assert!(fields.values().all(|v| is_two_decimals(*v)));
    }

    #[test]
    fn system_end_to_end() {
        let fields = decode(BlockType::System, &system_block()).unwrap();

        assert_eq!(fields["AC Consumption L1"], 100.0);
        assert_eq!(fields["AC Consumption L2"], 200.0);
        assert_eq!(fields["AC Consumption L3"], 300.0);
        assert_eq!(fields["Grid L1"], -1.0);
        assert_eq!(fields["Grid L2"], -2.0);
        assert_eq!(fields["Grid L3"], -3.0);
        assert_eq!(fields["Active input source"], 1.0);
        assert_eq!(fields["PV - AC-coupled on output L1"], 0.0);
    }

    #[test]
    fn signed_reinterpretation() {
        let field = ScaledField::signed("test", 0, 1.0);

        assert_eq!(field.apply(65535), -1.0);
        assert_eq!(field.apply(0), 0.0);
        assert_eq!(field.apply(32768), -32768.0);
        assert_eq!(field.apply(32767), 32767.0);
    }

    #[test]
    fn unsigned_fields_stay_positive() {
        let mut raw = vec![0; 27];
        raw[17] = 65535;
        let fields = decode(BlockType::System, &raw).unwrap();

        assert_eq!(fields["AC Consumption L1"], 65535.0);
    }

    #[test]
    fn battery_scaling() {
        let fields = decode(BlockType::Battery, &[247, 65526, 65436, 95, 1, 0, 600]).unwrap();

        assert_eq!(fields["Battery Voltage"], 24.7);
        assert_eq!(fields["Battery Current"], -1.0);
        assert_eq!(fields["Battery Power"], -100.0);
        assert_eq!(fields["Battery State of Charge"], 95.0);
        assert_eq!(fields["Battery State"], 1.0);
        assert_eq!(fields["Battery Time to Go"], 600.0);
    }

    #[test]
    fn decode_is_repeatable() {
        let raw = system_block();

        assert_eq!(
            decode(BlockType::System, &raw).unwrap(),
            decode(BlockType::System, &raw).unwrap()
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            decode(BlockType::System, &[0; 26]),
            Err(DecodeError::WrongLength {
                block: BlockType::System,
                expected: 27,
                actual: 26
            })
        );
        assert!(decode(BlockType::Battery, &[0; 8]).is_err());
        assert!(decode(BlockType::Battery, &[]).is_err());
    }

    #[test]
    fn wrong_length_message() {
        let err = decode(BlockType::Battery, &[0; 3]).unwrap_err();

        assert_eq!(err.to_string(), "BATTERY block: expected 7 registers, got 3");
    }

    #[test]
    fn concurrent_decode_matches_serial() {
        let expected = decode(BlockType::System, &system_block()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| decode(BlockType::System, &system_block()).unwrap()))
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(247.0 * 0.1), 24.7);
        assert_eq!(round2(-32768.0), -32768.0);
    }

    #[test]
    fn block_layouts() {
        assert_eq!(BlockType::System.start(), 800);
        assert_eq!(BlockType::System.count(), 27);
        assert_eq!(BlockType::Battery.start(), 840);
        assert_eq!(BlockType::Battery.count(), 7);
        assert_eq!(BlockType::System.category(), "system");
        assert_eq!(BlockType::Battery.category(), "battery");
    }
}
