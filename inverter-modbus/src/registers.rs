//! Static catalog of the inverter's holding register map.
//!
//! Addresses and encodings follow the vendor's Modbus register documentation
//! (tables 3-1 through 3-11). The catalog is split into [`telemetry`]
//! (read-only identity and measurement registers) and [`control`] (writable
//! settings). Descriptors are plain `const` values; nothing here performs
//! I/O.

use crate::codec::{Address, Quantity, Word};

/// On-wire interpretation of a register's raw words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    U16,
    I16,
    U32,
    I32,
    /// Text spanning `n` registers, two characters per word, NUL-padded.
    Str(Quantity),
    /// 16 independent flags in a single word.
    Bitfield16,
}

impl RegisterKind {
    /// Number of consecutive registers the value occupies.
    pub const fn word_count(self) -> Quantity {
        match self {
            RegisterKind::U16 | RegisterKind::I16 | RegisterKind::Bitfield16 => 1,
            RegisterKind::U32 | RegisterKind::I32 => 2,
            RegisterKind::Str(words) => words,
        }
    }

    /// Resolve an on-wire type name from the custom read/write API.
    ///
    /// `length` must match the type's register footprint; `string` accepts
    /// any positive length.
    pub fn parse(name: &str, length: Quantity) -> Option<Self> {
        let kind = match name {
            "u16" => RegisterKind::U16,
            "i16" => RegisterKind::I16,
            "u32" => RegisterKind::U32,
            "i32" => RegisterKind::I32,
            "bitfield16" => RegisterKind::Bitfield16,
            "string" => {
                return if length > 0 {
                    Some(RegisterKind::Str(length))
                } else {
                    None
                };
            }
            _ => return None,
        };
        if kind.word_count() == length {
            Some(kind)
        } else {
            None
        }
    }
}

/// Whether a register accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Describes one logical quantity in the device's register map.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDef {
    /// Holding register offset.
    pub address: Address,
    pub kind: RegisterKind,
    /// Divisor turning raw integers into engineering units
    /// (decoded = raw / scale, encoded raw = round(value * scale)).
    pub scale: Option<f64>,
    /// Display label, informational only.
    pub unit: Option<&'static str>,
    /// Inclusive bound on the decoded value, enforced on writes.
    pub range: Option<(f64, f64)>,
    pub access: Access,
    /// Symbolic names for enumerated values, informational only.
    pub options: Option<&'static [(&'static str, Word)]>,
}

impl RegisterDef {
    pub const fn read_only(address: Address, kind: RegisterKind) -> Self {
        Self {
            address,
            kind,
            scale: None,
            unit: None,
            range: None,
            access: Access::ReadOnly,
            options: None,
        }
    }

    pub const fn writable(address: Address, kind: RegisterKind) -> Self {
        Self {
            access: Access::ReadWrite,
            ..Self::read_only(address, kind)
        }
    }

    pub const fn with_scale(self, scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..self
        }
    }

    pub const fn with_unit(self, unit: &'static str) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }

    pub const fn with_range(self, min: f64, max: f64) -> Self {
        Self {
            range: Some((min, max)),
            ..self
        }
    }

    pub const fn with_options(self, options: &'static [(&'static str, Word)]) -> Self {
        Self {
            options: Some(options),
            ..self
        }
    }
}

/// Read-only identity and measurement registers.
pub mod telemetry {
    use super::RegisterDef;
    use super::RegisterKind::{Bitfield16, Str, I16, I32, U16, U32};

    // Model information (table 3-1)
    pub const MODEL_NAME: RegisterDef = RegisterDef::read_only(30000, Str(16));
    pub const SERIAL_NUMBER: RegisterDef = RegisterDef::read_only(30016, Str(16));
    pub const MFG_ID: RegisterDef = RegisterDef::read_only(30032, Str(16));

    // Version information (table 3-2)
    pub const MASTER_VERSION: RegisterDef = RegisterDef::read_only(36001, U16);
    pub const SLAVE_VERSION: RegisterDef = RegisterDef::read_only(36002, U16);
    pub const MANAGER_VERSION: RegisterDef = RegisterDef::read_only(36003, U16);

    // Protocol and device info (table 3-5)
    pub const PROTOCOL_VERSION: RegisterDef = RegisterDef::read_only(39000, U32);
    pub const RATED_POWER: RegisterDef = RegisterDef::read_only(39053, I32)
        .with_scale(1000.0)
        .with_unit("kW");
    pub const MAX_ACTIVE_POWER: RegisterDef = RegisterDef::read_only(39055, I32)
        .with_scale(1000.0)
        .with_unit("kW");

    // Status and alarms
    pub const STATUS_1: RegisterDef = RegisterDef::read_only(39063, Bitfield16);
    pub const ALARM_1: RegisterDef = RegisterDef::read_only(39067, Bitfield16);
    pub const ALARM_2: RegisterDef = RegisterDef::read_only(39068, Bitfield16);
    pub const ALARM_3: RegisterDef = RegisterDef::read_only(39069, Bitfield16);

    // PV input
    pub const PV1_VOLTAGE: RegisterDef = RegisterDef::read_only(39070, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const PV1_CURRENT: RegisterDef = RegisterDef::read_only(39071, I16)
        .with_scale(100.0)
        .with_unit("A");
    pub const PV2_VOLTAGE: RegisterDef = RegisterDef::read_only(39072, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const PV2_CURRENT: RegisterDef = RegisterDef::read_only(39073, I16)
        .with_scale(100.0)
        .with_unit("A");
    pub const PV3_VOLTAGE: RegisterDef = RegisterDef::read_only(39074, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const PV3_CURRENT: RegisterDef = RegisterDef::read_only(39075, I16)
        .with_scale(100.0)
        .with_unit("A");
    pub const PV4_VOLTAGE: RegisterDef = RegisterDef::read_only(39076, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const PV4_CURRENT: RegisterDef = RegisterDef::read_only(39077, I16)
        .with_scale(100.0)
        .with_unit("A");
    pub const TOTAL_PV_POWER: RegisterDef = RegisterDef::read_only(39118, I32)
        .with_scale(1000.0)
        .with_unit("kW");

    // Grid
    pub const GRID_R_VOLTAGE: RegisterDef = RegisterDef::read_only(39123, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const GRID_S_VOLTAGE: RegisterDef = RegisterDef::read_only(39124, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const GRID_T_VOLTAGE: RegisterDef = RegisterDef::read_only(39125, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const INVERTER_R_CURRENT: RegisterDef = RegisterDef::read_only(39126, I32)
        .with_scale(1000.0)
        .with_unit("A");
    pub const INVERTER_S_CURRENT: RegisterDef = RegisterDef::read_only(39128, I32)
        .with_scale(1000.0)
        .with_unit("A");
    pub const INVERTER_T_CURRENT: RegisterDef = RegisterDef::read_only(39130, I32)
        .with_scale(1000.0)
        .with_unit("A");
    pub const ACTIVE_POWER: RegisterDef = RegisterDef::read_only(39134, I32)
        .with_scale(1000.0)
        .with_unit("kW");
    pub const REACTIVE_POWER: RegisterDef = RegisterDef::read_only(39136, I32)
        .with_scale(1000.0)
        .with_unit("kVar");
    pub const POWER_FACTOR: RegisterDef = RegisterDef::read_only(39138, I16).with_scale(1000.0);
    pub const GRID_FREQUENCY: RegisterDef = RegisterDef::read_only(39139, I16)
        .with_scale(100.0)
        .with_unit("Hz");

    // Temperature
    pub const INTERNAL_TEMP: RegisterDef = RegisterDef::read_only(39141, I16)
        .with_scale(10.0)
        .with_unit("°C");

    // Energy statistics
    pub const CUMULATIVE_GENERATION: RegisterDef = RegisterDef::read_only(39149, U32)
        .with_scale(100.0)
        .with_unit("kWh");
    pub const DAILY_GENERATION: RegisterDef = RegisterDef::read_only(39151, U32)
        .with_scale(100.0)
        .with_unit("kWh");

    // Battery
    pub const BATTERY1_VOLTAGE: RegisterDef = RegisterDef::read_only(39227, I16)
        .with_scale(10.0)
        .with_unit("V");
    pub const BATTERY1_CURRENT: RegisterDef = RegisterDef::read_only(39228, I32)
        .with_scale(1000.0)
        .with_unit("A");
    pub const BATTERY1_POWER: RegisterDef = RegisterDef::read_only(39230, I32).with_unit("W");
    pub const BATTERY_COMBINED_POWER: RegisterDef =
        RegisterDef::read_only(39237, I32).with_unit("W");

    // Battery management system
    pub const BMS1_SOC: RegisterDef = RegisterDef::read_only(37612, U16).with_unit("%");

    // Communication
    pub const NETWORK_STATUS: RegisterDef = RegisterDef::read_only(49240, U16);
}

/// Writable control and configuration registers.
pub mod control {
    use super::RegisterDef;
    use super::RegisterKind::{Bitfield16, I16, I32, U16};

    /// Work modes accepted by [`WORK_MODE`].
    pub const WORK_MODES: &[(&str, u16)] = &[
        ("SELF_USE", 1),
        ("FEEDIN_PRIORITY", 2),
        ("BACKUP", 3),
        ("PEAK_SHAVING", 4),
        ("FORCE_CHARGE", 6),
        ("FORCE_DISCHARGE", 7),
    ];

    /// Output modes accepted by [`EPS_OUTPUT`].
    pub const EPS_MODES: &[(&str, u16)] = &[("DISABLE", 0), ("EPS_MODE", 2), ("UPS_MODE", 3)];

    // Remote control (table 3-8)
    pub const REMOTE_CONTROL: RegisterDef = RegisterDef::writable(46001, Bitfield16);
    pub const REMOTE_TIMEOUT_SET: RegisterDef =
        RegisterDef::writable(46002, U16).with_unit("s");
    pub const REMOTE_ACTIVE_POWER: RegisterDef =
        RegisterDef::writable(46003, I32).with_unit("W");
    pub const REMOTE_REACTIVE_POWER: RegisterDef =
        RegisterDef::writable(46005, I32).with_unit("Var");

    // Power limits (table 3-9)
    pub const IMPORT_POWER_LIMIT: RegisterDef =
        RegisterDef::writable(46501, I32).with_unit("W");
    pub const THRESHOLD_SOC: RegisterDef = RegisterDef::writable(46503, U16)
        .with_unit("%")
        .with_range(0.0, 100.0);
    pub const EXPORT_POWER_LIMIT: RegisterDef =
        RegisterDef::writable(46504, I32).with_unit("W");

    // Battery settings (table 3-10); the H3 Pro variant allows up to 50 A
    pub const BATTERY_MAX_CHARGE_CURRENT: RegisterDef = RegisterDef::writable(46607, I16)
        .with_scale(10.0)
        .with_unit("A")
        .with_range(0.0, 26.0);
    pub const BATTERY_MAX_DISCHARGE_CURRENT: RegisterDef = RegisterDef::writable(46608, I16)
        .with_scale(10.0)
        .with_unit("A")
        .with_range(0.0, 26.0);
    pub const MIN_SOC: RegisterDef = RegisterDef::writable(46609, U16)
        .with_unit("%")
        .with_range(10.0, 100.0);
    pub const MAX_SOC: RegisterDef = RegisterDef::writable(46610, U16)
        .with_unit("%")
        .with_range(10.0, 100.0);
    pub const MIN_SOC_ONGRID: RegisterDef = RegisterDef::writable(46611, U16)
        .with_unit("%")
        .with_range(10.0, 100.0);
    pub const EPS_OUTPUT: RegisterDef =
        RegisterDef::writable(46613, U16).with_options(EPS_MODES);
    pub const EXPORT_POWER_LIMIT_2: RegisterDef =
        RegisterDef::writable(46616, I32).with_unit("W");

    // Work mode and system settings (table 3-11)
    pub const WORK_MODE: RegisterDef =
        RegisterDef::writable(49203, U16).with_options(WORK_MODES);
    pub const POWER_ON: RegisterDef = RegisterDef::writable(49077, U16).with_range(0.0, 1.0);
    pub const POWER_OFF: RegisterDef = RegisterDef::writable(49078, U16).with_range(0.0, 1.0);
    pub const GRID_STANDARD_CODE: RegisterDef = RegisterDef::writable(49079, U16);
}

/// Telemetry catalog keyed by register name.
pub const TELEMETRY: &[(&str, RegisterDef)] = &[
    ("MODEL_NAME", telemetry::MODEL_NAME),
    ("SERIAL_NUMBER", telemetry::SERIAL_NUMBER),
    ("MFG_ID", telemetry::MFG_ID),
    ("MASTER_VERSION", telemetry::MASTER_VERSION),
    ("SLAVE_VERSION", telemetry::SLAVE_VERSION),
    ("MANAGER_VERSION", telemetry::MANAGER_VERSION),
    ("PROTOCOL_VERSION", telemetry::PROTOCOL_VERSION),
    ("RATED_POWER", telemetry::RATED_POWER),
    ("MAX_ACTIVE_POWER", telemetry::MAX_ACTIVE_POWER),
    ("STATUS_1", telemetry::STATUS_1),
    ("ALARM_1", telemetry::ALARM_1),
    ("ALARM_2", telemetry::ALARM_2),
    ("ALARM_3", telemetry::ALARM_3),
    ("PV1_VOLTAGE", telemetry::PV1_VOLTAGE),
    ("PV1_CURRENT", telemetry::PV1_CURRENT),
    ("PV2_VOLTAGE", telemetry::PV2_VOLTAGE),
    ("PV2_CURRENT", telemetry::PV2_CURRENT),
    ("PV3_VOLTAGE", telemetry::PV3_VOLTAGE),
    ("PV3_CURRENT", telemetry::PV3_CURRENT),
    ("PV4_VOLTAGE", telemetry::PV4_VOLTAGE),
    ("PV4_CURRENT", telemetry::PV4_CURRENT),
    ("TOTAL_PV_POWER", telemetry::TOTAL_PV_POWER),
    ("GRID_R_VOLTAGE", telemetry::GRID_R_VOLTAGE),
    ("GRID_S_VOLTAGE", telemetry::GRID_S_VOLTAGE),
    ("GRID_T_VOLTAGE", telemetry::GRID_T_VOLTAGE),
    ("INVERTER_R_CURRENT", telemetry::INVERTER_R_CURRENT),
    ("INVERTER_S_CURRENT", telemetry::INVERTER_S_CURRENT),
    ("INVERTER_T_CURRENT", telemetry::INVERTER_T_CURRENT),
    ("ACTIVE_POWER", telemetry::ACTIVE_POWER),
    ("REACTIVE_POWER", telemetry::REACTIVE_POWER),
    ("POWER_FACTOR", telemetry::POWER_FACTOR),
    ("GRID_FREQUENCY", telemetry::GRID_FREQUENCY),
    ("INTERNAL_TEMP", telemetry::INTERNAL_TEMP),
    ("CUMULATIVE_GENERATION", telemetry::CUMULATIVE_GENERATION),
    ("DAILY_GENERATION", telemetry::DAILY_GENERATION),
    ("BATTERY1_VOLTAGE", telemetry::BATTERY1_VOLTAGE),
    ("BATTERY1_CURRENT", telemetry::BATTERY1_CURRENT),
    ("BATTERY1_POWER", telemetry::BATTERY1_POWER),
    ("BATTERY_COMBINED_POWER", telemetry::BATTERY_COMBINED_POWER),
    ("BMS1_SOC", telemetry::BMS1_SOC),
    ("NETWORK_STATUS", telemetry::NETWORK_STATUS),
];

/// Writable catalog keyed by the names accepted by the generic write API.
pub const WRITABLE: &[(&str, RegisterDef)] = &[
    ("REMOTE_CONTROL", control::REMOTE_CONTROL),
    ("REMOTE_TIMEOUT_SET", control::REMOTE_TIMEOUT_SET),
    ("REMOTE_ACTIVE_POWER", control::REMOTE_ACTIVE_POWER),
    ("REMOTE_REACTIVE_POWER", control::REMOTE_REACTIVE_POWER),
    ("IMPORT_POWER_LIMIT", control::IMPORT_POWER_LIMIT),
    ("THRESHOLD_SOC", control::THRESHOLD_SOC),
    ("EXPORT_POWER_LIMIT", control::EXPORT_POWER_LIMIT),
    ("BATTERY_MAX_CHARGE_CURRENT", control::BATTERY_MAX_CHARGE_CURRENT),
    (
        "BATTERY_MAX_DISCHARGE_CURRENT",
        control::BATTERY_MAX_DISCHARGE_CURRENT,
    ),
    ("MIN_SOC", control::MIN_SOC),
    ("MAX_SOC", control::MAX_SOC),
    ("MIN_SOC_ONGRID", control::MIN_SOC_ONGRID),
    ("EPS_OUTPUT", control::EPS_OUTPUT),
    ("EXPORT_POWER_LIMIT_2", control::EXPORT_POWER_LIMIT_2),
    ("WORK_MODE", control::WORK_MODE),
    ("POWER_ON", control::POWER_ON),
    ("POWER_OFF", control::POWER_OFF),
    ("GRID_STANDARD_CODE", control::GRID_STANDARD_CODE),
];

/// Look up a writable register by name.
pub fn writable(name: &str) -> Option<RegisterDef> {
    WRITABLE
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, def)| *def)
}

/// Build an ad-hoc descriptor for the custom read/write endpoints.
///
/// Rejects type/length mismatches and non-positive scales. The resulting
/// descriptor carries no range bound; custom writes are deliberately
/// unchecked beyond the type's own footprint.
pub fn custom(
    address: Address,
    length: Quantity,
    kind: &str,
    scale: Option<f64>,
) -> Option<RegisterDef> {
    if let Some(scale) = scale {
        if scale <= 0.0 {
            return None;
        }
    }
    let kind = RegisterKind::parse(kind, length)?;
    Some(RegisterDef {
        address,
        kind,
        scale,
        unit: None,
        range: None,
        access: Access::ReadWrite,
        options: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_counts_match_kinds() {
        for (name, def) in TELEMETRY.iter().chain(WRITABLE) {
            let expected = match def.kind {
                RegisterKind::U16 | RegisterKind::I16 | RegisterKind::Bitfield16 => 1,
                RegisterKind::U32 | RegisterKind::I32 => 2,
                RegisterKind::Str(words) => words,
            };
            assert_eq!(def.kind.word_count(), expected, "{name}");
            assert!(def.kind.word_count() > 0, "{name}");
        }
    }

    #[test]
    fn writable_table_has_no_strings_and_only_rw_entries() {
        for (name, def) in WRITABLE {
            assert_eq!(def.access, Access::ReadWrite, "{name}");
            assert!(!matches!(def.kind, RegisterKind::Str(_)), "{name}");
        }
    }

    #[test]
    fn ranges_bound_scaled_values() {
        let (min, max) = control::MIN_SOC.range.unwrap();
        assert_eq!((min, max), (10.0, 100.0));
        let (min, max) = control::BATTERY_MAX_CHARGE_CURRENT.range.unwrap();
        assert_eq!((min, max), (0.0, 26.0));
    }

    #[test]
    fn writable_lookup_finds_known_names_only() {
        assert_eq!(writable("WORK_MODE").unwrap().address, 49203);
        assert_eq!(writable("MIN_SOC").unwrap().address, 46609);
        assert!(writable("MODEL_NAME").is_none());
        assert!(writable("NO_SUCH_REGISTER").is_none());
    }

    #[test]
    fn custom_descriptor_validates_shape() {
        let def = custom(39123, 1, "i16", Some(10.0)).unwrap();
        assert_eq!(def.kind, RegisterKind::I16);
        assert_eq!(def.scale, Some(10.0));

        assert!(custom(39000, 2, "u32", None).is_some());
        assert!(custom(30000, 16, "string", None).is_some());

        // length must match the type's footprint
        assert!(custom(39123, 2, "i16", None).is_none());
        assert!(custom(39000, 1, "u32", None).is_none());
        assert!(custom(30000, 0, "string", None).is_none());
        // unknown type names and degenerate scales are rejected
        assert!(custom(39123, 1, "f32", None).is_none());
        assert!(custom(39123, 1, "u16", Some(0.0)).is_none());
    }

    #[test]
    fn work_mode_options_cover_documented_modes() {
        let options = control::WORK_MODE.options.unwrap();
        let values: Vec<u16> = options.iter().map(|(_, value)| *value).collect();
        assert_eq!(values, [1, 2, 3, 4, 6, 7]);
    }
}
