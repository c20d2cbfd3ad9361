use crate::protocol::{Command, ResponseFrame};
use crate::records::{CellVoltageRecord, PackInfoRecord, VersionRecord};
use crate::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! read_bit {
    ($byte:expr,$position:expr) => {
        ($byte >> $position) & 1 != 0
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductionDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl From<u16> for ProductionDate {
    fn from(raw: u16) -> Self {
        Self {
            year: (raw >> 9) + 2000,
            month: ((raw >> 5) & 0x0f) as u8,
            day: (raw & 0x1f) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SoftwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl From<u8> for SoftwareVersion {
    fn from(raw: u8) -> Self {
        Self {
            major: raw / 10,
            minor: raw % 10,
        }
    }
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FetStatus {
    pub charge: bool,
    pub discharge: bool,
}

impl From<u8> for FetStatus {
    fn from(raw: u8) -> Self {
        Self {
            charge: read_bit!(raw, 0),
            discharge: read_bit!(raw, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProtectionFlag {
    CellOvervoltage,
    CellUndervoltage,
    PackOvervoltage,
    PackUndervoltage,
    ChargeOverTemperature,
    ChargeLowTemperature,
    DischargeOverTemperature,
    DischargeLowTemperature,
    ChargeOvercurrent,
    DischargeOvercurrent,
    ShortCircuit,
    FrontendIcError,
    SoftwareLockMos,
}

impl fmt::Display for ProtectionFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtectionFlag::CellOvervoltage => write!(f, "Cell overvoltage protection"),
            ProtectionFlag::CellUndervoltage => write!(f, "Cell undervoltage protection"),
            ProtectionFlag::PackOvervoltage => write!(f, "Pack overvoltage protection"),
            ProtectionFlag::PackUndervoltage => write!(f, "Pack undervoltage protection"),
            ProtectionFlag::ChargeOverTemperature => write!(f, "Charging over temperature"),
            ProtectionFlag::ChargeLowTemperature => write!(f, "Charging low temperature"),
            ProtectionFlag::DischargeOverTemperature => {
                write!(f, "Discharging over temperature")
            }
            ProtectionFlag::DischargeLowTemperature => write!(f, "Discharging low temperature"),
            ProtectionFlag::ChargeOvercurrent => write!(f, "Charging over current"),
            ProtectionFlag::DischargeOvercurrent => write!(f, "Discharging over current"),
            ProtectionFlag::ShortCircuit => write!(f, "Short circuit protection"),
            ProtectionFlag::FrontendIcError => write!(f, "Front-end detection IC error"),
            ProtectionFlag::SoftwareLockMos => write!(f, "Software locked MOS"),
        }
    }
}

/// Protection status bitmap. Bits 13 to 15 are reserved by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtectionStatus {
    pub bits: u16,
}

impl ProtectionStatus {
    pub fn is_set(&self, flag: ProtectionFlag) -> bool {
        read_bit!(self.bits, flag as u16)
    }

    pub fn active(&self) -> Vec<ProtectionFlag> {
        let bits = self.bits;
        let mut result = Vec::new();

        macro_rules! ck_and_add {
            ($position:expr,$enum_type:expr) => {
                if read_bit!(bits, $position) {
                    result.push($enum_type);
                }
            };
        }

        ck_and_add!(0, ProtectionFlag::CellOvervoltage);
        ck_and_add!(1, ProtectionFlag::CellUndervoltage);
        ck_and_add!(2, ProtectionFlag::PackOvervoltage);
        ck_and_add!(3, ProtectionFlag::PackUndervoltage);
        ck_and_add!(4, ProtectionFlag::ChargeOverTemperature);
        ck_and_add!(5, ProtectionFlag::ChargeLowTemperature);
        ck_and_add!(6, ProtectionFlag::DischargeOverTemperature);
        ck_and_add!(7, ProtectionFlag::DischargeLowTemperature);
        ck_and_add!(8, ProtectionFlag::ChargeOvercurrent);
        ck_and_add!(9, ProtectionFlag::DischargeOvercurrent);
        ck_and_add!(10, ProtectionFlag::ShortCircuit);
        ck_and_add!(11, ProtectionFlag::FrontendIcError);
        ck_and_add!(12, ProtectionFlag::SoftwareLockMos);

        result
    }
}

/// Latest decoded state of the BMS.
///
/// Each response updates only its own group of fields, so a snapshot may mix
/// values from different polling cycles.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    /// Volts.
    pub total_voltage: f32,
    /// Amperes.
    pub current: f32,
    /// mAh.
    pub residual_capacity: u32,
    /// mAh.
    pub nominal_capacity: u32,
    pub cycles: u16,
    pub production_date: ProductionDate,
    pub balance_status_low: u16,
    pub balance_status_high: u16,
    pub protection: ProtectionStatus,
    pub software_version: SoftwareVersion,
    pub remaining_capacity_percent: u8,
    pub fet: FetStatus,
    pub strings: u8,
    pub ntc_count: u8,
    /// Degrees Celsius.
    pub temperatures: [f32; 4],
    /// Millivolts, one entry per cell.
    pub cell_voltages: Vec<u16>,
    pub version: Vec<u8>,
}

impl Snapshot {
    /// Decodes a validated frame and merges it into the snapshot.
    ///
    /// Frames for unknown commands are ignored. On a decode error the snapshot is
    /// left untouched.
    pub fn apply(&mut self, frame: &ResponseFrame) -> std::result::Result<(), Error> {
        match Command::try_from(frame.command) {
            Ok(Command::Info) => self.apply_info(&PackInfoRecord::decode(&frame.payload)?),
            Ok(Command::Cell) => self.apply_cells(&CellVoltageRecord::decode(&frame.payload)),
            Ok(Command::Version) => self.apply_version(&VersionRecord::decode(&frame.payload)),
            Err(err) => log::debug!("Ignoring frame: {err}"),
        }
        Ok(())
    }

    pub fn apply_info(&mut self, info: &PackInfoRecord) {
        self.total_voltage = f32::from(info.total_voltage) / 100.0;
        // device encoding, sign convention still to be confirmed on hardware
        self.current = !(0xffff - i32::from(info.current)) as f32 / 100.0;
        self.residual_capacity = u32::from(info.residual_capacity) * 10;
        self.nominal_capacity = u32::from(info.nominal_capacity) * 10;
        self.cycles = info.cycles;
        self.production_date = info.production_date.into();
        self.balance_status_low = info.balance_status_low;
        self.balance_status_high = info.balance_status_high;
        self.protection = ProtectionStatus {
            bits: info.protection_status,
        };
        // trailing byte fields missing from a short payload keep their last value
        if let Some(raw) = info.software_version {
            self.software_version = raw.into();
        }
        if let Some(percent) = info.remaining_capacity {
            self.remaining_capacity_percent = percent;
        }
        if let Some(raw) = info.fet_control {
            self.fet = raw.into();
        }
        if let Some(strings) = info.strings {
            self.strings = strings;
        }
        if let Some(ntc_count) = info.ntc_count {
            self.ntc_count = ntc_count;
        }
        for (temperature, raw) in self.temperatures.iter_mut().zip(&info.temperatures) {
            // 0.1 K
            *temperature = (f32::from(*raw) - 2731.0) / 10.0;
        }
    }

    pub fn apply_cells(&mut self, cells: &CellVoltageRecord) {
        self.cell_voltages.clone_from(&cells.0);
    }

    pub fn apply_version(&mut self, version: &VersionRecord) {
        self.version.clone_from(&version.0);
    }

    /// Version bytes as text, trailing NULs stripped.
    pub fn version_string(&self) -> String {
        String::from_utf8_lossy(&self.version)
            .trim_end_matches('\0')
            .to_string()
    }
}
