//! Raw payload records, decoded field by field from a validated frame payload.
//!
//! Info payload layout (offsets in bytes, 16 bit values high byte first):
//!
//! | offset | size | field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 2    | total voltage, 10 mV                   |
//! | 2      | 2    | current, 10 mA                         |
//! | 4      | 2    | residual capacity, 10 mAh              |
//! | 6      | 2    | nominal capacity, 10 mAh               |
//! | 8      | 2    | cycle count                            |
//! | 10     | 2    | production date, `yyyyyyym mmmddddd`   |
//! | 12     | 2    | balance status, cells 1-16             |
//! | 14     | 2    | balance status, cells 17-32            |
//! | 16     | 2    | protection status                      |
//! | 18     | 1    | software version, `major * 10 + minor` |
//! | 19     | 1    | remaining capacity, percent            |
//! | 20     | 1    | FET control, bit 0 charge, bit 1 discharge |
//! | 21     | 1    | number of battery strings              |
//! | 22     | 1    | number of NTC sensors                  |
//! | 23     | 2*n  | NTC readings, 0.1 K                    |
//!
//! Only the 16 bit fields are mandatory. Devices may end the payload anywhere after
//! them; single byte fields past the end are reported as absent.

use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes holding the 16 bit info fields, the shortest info payload accepted.
pub const INFO_MIN_LENGTH: usize = 18;
/// Bytes of the info payload before the NTC readings.
pub const INFO_FIXED_LENGTH: usize = 23;
pub const MAX_TEMPERATURES: usize = 4;
pub const MAX_CELLS: usize = 17;
pub const MAX_VERSION_LENGTH: usize = 10;

fn read_u16(payload: &[u8], offset: usize) -> u16 {
    // high byte first on the wire
    u16::from(payload[offset + 1]) | (u16::from(payload[offset]) << 8)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackInfoRecord {
    pub total_voltage: u16,
    pub current: u16,
    pub residual_capacity: u16,
    pub nominal_capacity: u16,
    pub cycles: u16,
    pub production_date: u16,
    pub balance_status_low: u16,
    pub balance_status_high: u16,
    pub protection_status: u16,
    /// `None` when the payload ends before the field.
    pub software_version: Option<u8>,
    pub remaining_capacity: Option<u8>,
    pub fet_control: Option<u8>,
    pub strings: Option<u8>,
    pub ntc_count: Option<u8>,
    /// At most [`MAX_TEMPERATURES`] readings, limited by `ntc_count` and the payload.
    pub temperatures: Vec<u16>,
}

impl PackInfoRecord {
    pub fn decode(payload: &[u8]) -> std::result::Result<Self, Error> {
        if payload.len() < INFO_MIN_LENGTH {
            return Err(Error::ReplySize {
                required: INFO_MIN_LENGTH,
                received: payload.len(),
            });
        }
        let ntc_count = payload.get(22).copied();
        let announced = usize::from(ntc_count.unwrap_or(0)).min(MAX_TEMPERATURES);
        let available = payload.len().saturating_sub(INFO_FIXED_LENGTH) / 2;
        let n_temperatures = announced.min(available);
        if n_temperatures < announced {
            log::debug!(
                "Info payload announces {} NTC readings but carries {}",
                announced,
                available
            );
        }
        if payload.len() < INFO_FIXED_LENGTH {
            log::debug!("Short info payload of {} bytes", payload.len());
        }

        Ok(Self {
            total_voltage: read_u16(payload, 0),
            current: read_u16(payload, 2),
            residual_capacity: read_u16(payload, 4),
            nominal_capacity: read_u16(payload, 6),
            cycles: read_u16(payload, 8),
            production_date: read_u16(payload, 10),
            balance_status_low: read_u16(payload, 12),
            balance_status_high: read_u16(payload, 14),
            protection_status: read_u16(payload, 16),
            software_version: payload.get(18).copied(),
            remaining_capacity: payload.get(19).copied(),
            fet_control: payload.get(20).copied(),
            strings: payload.get(21).copied(),
            ntc_count,
            temperatures: (0..n_temperatures)
                .map(|i| read_u16(payload, INFO_FIXED_LENGTH + 2 * i))
                .collect(),
        })
    }
}

/// Cell voltages in millivolts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellVoltageRecord(pub Vec<u16>);

impl CellVoltageRecord {
    /// One cell per byte pair. A trailing odd byte is ignored and at most
    /// [`MAX_CELLS`] cells are kept.
    pub fn decode(payload: &[u8]) -> Self {
        let cells: Vec<u16> = payload
            .chunks_exact(2)
            .take(MAX_CELLS)
            // swapped relative to the info fields: first wire byte is the high byte
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        for (n_cell, volt) in cells.iter().enumerate() {
            log::trace!("cell #{} mV={}", n_cell + 1, volt);
        }
        Self(cells)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VersionRecord(pub Vec<u8>);

impl VersionRecord {
    pub fn decode(payload: &[u8]) -> Self {
        Self(payload.iter().take(MAX_VERSION_LENGTH).copied().collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const INFO_PAYLOAD: [u8; 27] = [
        0x14, 0xb4, // 53.00 V
        0xff, 0x9c, // current
        0x27, 0x10, // 10000 * 10 mAh
        0x2e, 0xe0, // 12000 * 10 mAh
        0x00, 0x2a, // 42 cycles
        0x2c, 0x6f, // 2022-03-15
        0x00, 0x05, // balancing cells 1 and 3
        0x00, 0x00, //
        0x04, 0x01, // cell overvoltage, short circuit
        0x1c, // v2.8
        0x51, // 81 %
        0x03, // both FETs on
        0x0f, // 15 strings
        0x02, // 2 NTC
        0x0b, 0xa5, // 25.0 C
        0x0b, 0x41, // 15.0 C
    ];

    #[test]
    fn info_fields() {
        let info = PackInfoRecord::decode(&INFO_PAYLOAD).unwrap();
        assert_eq!(info.total_voltage, 5300);
        assert_eq!(info.current, 0xff9c);
        assert_eq!(info.residual_capacity, 10000);
        assert_eq!(info.nominal_capacity, 12000);
        assert_eq!(info.cycles, 42);
        assert_eq!(info.production_date, 0x2c6f);
        assert_eq!(info.balance_status_low, 0x0005);
        assert_eq!(info.protection_status, 0x0401);
        assert_eq!(info.software_version, Some(28));
        assert_eq!(info.remaining_capacity, Some(81));
        assert_eq!(info.fet_control, Some(0x03));
        assert_eq!(info.strings, Some(15));
        assert_eq!(info.ntc_count, Some(2));
        assert_eq!(info.temperatures, vec![2981, 2881]);
    }

    #[test]
    fn info_without_ntc_count() {
        let info = PackInfoRecord::decode(&INFO_PAYLOAD[..22]).unwrap();
        assert_eq!(info.total_voltage, 5300);
        assert_eq!(info.protection_status, 0x0401);
        assert_eq!(info.strings, Some(15));
        assert_eq!(info.ntc_count, None);
        assert!(info.temperatures.is_empty());

        let info = PackInfoRecord::decode(&INFO_PAYLOAD[..19]).unwrap();
        assert_eq!(info.software_version, Some(28));
        assert_eq!(info.remaining_capacity, None);
        assert_eq!(info.strings, None);
    }

    #[test]
    fn info_too_short() {
        assert!(matches!(
            PackInfoRecord::decode(&INFO_PAYLOAD[..17]),
            Err(Error::ReplySize {
                required: 18,
                received: 17
            })
        ));
        assert!(PackInfoRecord::decode(&[]).is_err());
    }

    #[test]
    fn info_temperatures_bounded_by_payload() {
        let mut payload = INFO_PAYLOAD.to_vec();
        payload[22] = 6;
        let info = PackInfoRecord::decode(&payload).unwrap();
        assert_eq!(info.temperatures.len(), 2);

        payload.truncate(INFO_FIXED_LENGTH + 1);
        let info = PackInfoRecord::decode(&payload).unwrap();
        assert!(info.temperatures.is_empty());
    }

    #[test]
    fn cell_bytes_are_swapped() {
        assert_eq!(CellVoltageRecord::decode(&[0x0f, 0xa0]).0, vec![4000]);
        assert_eq!(
            CellVoltageRecord::decode(&[0x0d, 0x05, 0x0c, 0xff, 0x01]).0,
            vec![3333, 3327]
        );
    }

    #[test]
    fn at_most_seventeen_cells() {
        let payload = [0x0e_u8, 0x10].repeat(20);
        let cells = CellVoltageRecord::decode(&payload);
        assert_eq!(cells.0.len(), MAX_CELLS);
        assert!(cells.0.iter().all(|mv| *mv == 3600));
    }

    #[test]
    fn version_is_truncated() {
        assert_eq!(VersionRecord::decode(b"0123456789AB").0, b"0123456789");
    }
}
