//! Coggan 7-zone power zones.
//!
//! Zones are bands of FTP percentage with breakpoints at 55, 75, 90, 105,
//! 120 and 150%. A power sitting exactly on a breakpoint belongs to the
//! zone above it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RGB color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Format as a `#rrggbb` hex string.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Default power zone colors (Coggan standard)
pub const POWER_ZONE_COLORS: [Color; 7] = [
    Color::new(128, 128, 128), // Z1: Gray (Active Recovery)
    Color::new(0, 128, 255),   // Z2: Blue (Endurance)
    Color::new(0, 200, 100),   // Z3: Green (Tempo)
    Color::new(255, 200, 0),   // Z4: Yellow (Threshold)
    Color::new(255, 128, 0),   // Z5: Orange (VO2 Max)
    Color::new(255, 50, 50),   // Z6: Red (Anaerobic)
    Color::new(180, 0, 180),   // Z7: Purple (Neuromuscular)
];

/// Upper FTP percentage of zones 1-6. Zone 7 is open-ended.
const ZONE_UPPER_PERCENT: [u16; 6] = [55, 75, 90, 105, 120, 150];

/// Zone classification errors.
#[derive(Debug, Error, PartialEq)]
pub enum ZoneError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn validate_ftp(ftp: f64) -> Result<(), ZoneError> {
    if ftp.is_finite() && ftp > 0.0 {
        Ok(())
    } else {
        Err(ZoneError::InvalidConfig(format!(
            "FTP must be a positive number of watts, got {}",
            ftp
        )))
    }
}

/// Training intensity zone, 1 (lowest) to 7 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerZone {
    ActiveRecovery = 1,
    Endurance = 2,
    Tempo = 3,
    Threshold = 4,
    Vo2Max = 5,
    Anaerobic = 6,
    Neuromuscular = 7,
}

impl PowerZone {
    /// All zones in ascending order.
    pub const ALL: [PowerZone; 7] = [
        PowerZone::ActiveRecovery,
        PowerZone::Endurance,
        PowerZone::Tempo,
        PowerZone::Threshold,
        PowerZone::Vo2Max,
        PowerZone::Anaerobic,
        PowerZone::Neuromuscular,
    ];

    /// Zone number (1-7).
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Zone for a number in 1-7.
    pub fn from_number(zone: u8) -> Option<Self> {
        Self::ALL.get(usize::from(zone).checked_sub(1)?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerZone::ActiveRecovery => "Active Recovery",
            PowerZone::Endurance => "Endurance",
            PowerZone::Tempo => "Tempo",
            PowerZone::Threshold => "Threshold",
            PowerZone::Vo2Max => "VO2 Max",
            PowerZone::Anaerobic => "Anaerobic",
            PowerZone::Neuromuscular => "Neuromuscular",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PowerZone::ActiveRecovery => "Very light intensity for recovery",
            PowerZone::Endurance => "Light intensity for building endurance",
            PowerZone::Tempo => "Moderate intensity sustainable for long periods",
            PowerZone::Threshold => "Hard intensity at or near FTP",
            PowerZone::Vo2Max => "Very hard intensity for VO2 Max development",
            PowerZone::Anaerobic => "Extremely hard intensity for anaerobic capacity",
            PowerZone::Neuromuscular => "Maximum intensity for neuromuscular power",
        }
    }

    pub fn color(self) -> Color {
        POWER_ZONE_COLORS[self.index()]
    }

    /// Lower bound as a percentage of FTP.
    pub fn min_percent(self) -> u16 {
        match self.index() {
            0 => 0,
            i => ZONE_UPPER_PERCENT[i - 1],
        }
    }

    /// Upper bound as a percentage of FTP, `None` for zone 7.
    pub fn max_percent(self) -> Option<u16> {
        ZONE_UPPER_PERCENT.get(self.index()).copied()
    }

    fn index(self) -> usize {
        usize::from(self.number()) - 1
    }
}

impl fmt::Display for PowerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Z{} {}", self.number(), self.name())
    }
}

/// Classify a power value against FTP.
///
/// `ftp` must be positive. Each breakpoint is a strict `<` comparison, so
/// exactly 55% of FTP is zone 2.
pub fn zone_of(power: f64, ftp: f64) -> Result<PowerZone, ZoneError> {
    validate_ftp(ftp)?;

    // power / ftp * 100 < pct, rearranged to keep breakpoints exact
    let scaled = power * 100.0;
    let zone = ZONE_UPPER_PERCENT
        .iter()
        .position(|&pct| scaled < f64::from(pct) * ftp)
        .map_or(PowerZone::Neuromuscular, |i| PowerZone::ALL[i]);

    Ok(zone)
}

/// Wattage band of a zone. `max` is `None` for the open-ended top zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WattRange {
    pub min: u16,
    pub max: Option<u16>,
}

impl fmt::Display for WattRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}-{} W", self.min, max),
            None => write!(f, "{}+ W", self.min),
        }
    }
}

fn percent_of_ftp(percent: u16, ftp: f64) -> u16 {
    (f64::from(percent) * ftp / 100.0)
        .round()
        .clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Watt range of a zone for the given FTP, breakpoints rounded to the nearest watt.
pub fn zone_watt_range(zone: PowerZone, ftp: f64) -> Result<WattRange, ZoneError> {
    validate_ftp(ftp)?;

    Ok(WattRange {
        min: percent_of_ftp(zone.min_percent(), ftp),
        max: zone.max_percent().map(|pct| percent_of_ftp(pct, ftp)),
    })
}

/// A power zone with its FTP-derived watt range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRange {
    pub zone: PowerZone,
    pub min_percent: u16,
    /// `None` = no upper limit
    pub max_percent: Option<u16>,
    pub watts: WattRange,
    pub color: Color,
    pub name: String,
    pub description: String,
}

/// The full zone table for one FTP value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerZones {
    pub ftp: f64,
    zones: Vec<ZoneRange>,
}

impl PowerZones {
    /// Calculate power zones from FTP using the Coggan 7-zone model.
    pub fn from_ftp(ftp: f64) -> Result<Self, ZoneError> {
        validate_ftp(ftp)?;

        let zones = PowerZone::ALL
            .iter()
            .map(|&zone| {
                Ok(ZoneRange {
                    zone,
                    min_percent: zone.min_percent(),
                    max_percent: zone.max_percent(),
                    watts: zone_watt_range(zone, ftp)?,
                    color: zone.color(),
                    name: zone.name().to_string(),
                    description: zone.description().to_string(),
                })
            })
            .collect::<Result<Vec<_>, ZoneError>>()?;

        Ok(Self { ftp, zones })
    }

    /// Get the zone for a given power value.
    pub fn get_zone(&self, power: f64) -> PowerZone {
        // FTP was validated on construction
        zone_of(power, self.ftp).unwrap_or(PowerZone::ActiveRecovery)
    }

    /// Get the zone range for a given zone.
    pub fn get_zone_range(&self, zone: PowerZone) -> &ZoneRange {
        &self.zones[usize::from(zone.number()) - 1]
    }

    /// Get all zones in ascending order.
    pub fn all_zones(&self) -> &[ZoneRange] {
        &self.zones
    }
}
