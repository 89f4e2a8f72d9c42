//! Trainer GATT protocol: service/characteristic UUIDs, control point
//! commands and Cycling Power Measurement parsing.

use uuid::Uuid;

/// Bluetooth SIG base UUID (0000xxxx-0000-1000-8000-00805f9b34fb).
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit assigned number to a full Bluetooth UUID.
pub const fn bluetooth_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = bluetooth_uuid(0x1826);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid = bluetooth_uuid(0x2ad9);

/// Cycling Power Service UUID (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid = bluetooth_uuid(0x1818);

/// Cycling Power Measurement UUID (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid = bluetooth_uuid(0x2a63);

/// Control point opcodes understood by the trainer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Set gradient, followed by a signed 16-bit value in 0.01% units
    SetGradient = 0x46,
}

/// Build a control point command to request control.
pub fn build_request_control() -> Vec<u8> {
    vec![ControlOpcode::RequestControl as u8]
}

/// The 3-byte "set gradient" control point command.
///
/// Byte 0 is the opcode, bytes 1-2 the gradient in hundredths of a percent
/// as little-endian `i16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientCommand([u8; 3]);

impl GradientCommand {
    /// Encode a gradient in percent.
    ///
    /// `gradient * 100` is rounded half away from zero (2.345% -> 235,
    /// -2.345% -> -235) and saturates at the `i16` range. NaN encodes as 0.
    pub fn encode(gradient_percent: f64) -> Self {
        let hundredths = (gradient_percent * 100.0).round();
        let value = if hundredths.is_nan() {
            0
        } else {
            hundredths.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
        };

        let [lo, hi] = value.to_le_bytes();
        Self([ControlOpcode::SetGradient as u8, lo, hi])
    }

    /// Decode a command back to a gradient in percent.
    ///
    /// Returns `None` unless `bytes` is exactly a set-gradient command.
    pub fn decode(bytes: &[u8]) -> Option<f64> {
        match bytes {
            [op, lo, hi] if *op == ControlOpcode::SetGradient as u8 => {
                Some(f64::from(i16::from_le_bytes([*lo, *hi])) / 100.0)
            }
            _ => None,
        }
    }

    /// Raw value in hundredths of a percent.
    pub fn hundredths(&self) -> i16 {
        i16::from_le_bytes([self.0[1], self.0[2]])
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl AsRef<[u8]> for GradientCommand {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parsed Cycling Power Measurement data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CyclingPowerData {
    /// Instantaneous power in watts
    pub power_watts: u16,
}

/// Parse a Cycling Power Measurement notification.
///
/// Bytes 0-1 are flags, bytes 2-3 the instantaneous power as little-endian
/// `u16`. Anything after the power field is ignored; shorter payloads are
/// rejected.
pub fn parse_cycling_power_measurement(data: &[u8]) -> Option<CyclingPowerData> {
    match data {
        [_, _, lo, hi, ..] => Some(CyclingPowerData {
            power_watts: u16::from_le_bytes([*lo, *hi]),
        }),
        _ => None,
    }
}
