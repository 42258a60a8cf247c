//! Register map and telemetry decoding for the boiler PLC.
//!
//! The PLC exposes its process image as a contiguous range of holding
//! registers. Each boiler occupies a fixed-size group of big-endian 16-bit
//! words; this module turns such a range into typed [`BoilerReading`]
//! records. Nothing in here performs I/O.
//!
//! ```
//! use boiler_telemetry_lib::protocol::{RawFrame, RegisterMap};
//!
//! let map = RegisterMap::default();
//! let block = map.block().unwrap();
//! let frame = RawFrame::new(block, vec![0; block.byte_len()]).unwrap();
//! let readings = map.decode(&frame).unwrap();
//! assert_eq!(readings.len(), 3);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while describing or decoding register data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The number of bytes does not match the requested register count.
    #[error("Frame holds {actual} bytes but {expected} bytes were expected")]
    LengthMismatch { expected: usize, actual: usize },

    /// Not even a single boiler group fits into the frame.
    #[error("Frame holds {actual} registers but one boiler needs {required}")]
    InsufficientData { required: usize, actual: usize },

    /// The block is empty or runs past the end of the register address space.
    #[error("Register block starting at {start} with {count} registers is out of range")]
    BlockOutOfRange { start: u16, count: u32 },

    /// The chunk size is outside of what a single read request can carry.
    #[error("Chunk size {0} is out of range (1..=125)")]
    ChunkSizeOutOfRange(u16),

    #[error("Boiler layout must contain at least one field")]
    EmptyLayout,

    #[error("Field '{0}' appears more than once in the boiler layout")]
    DuplicateField(Field),
}

/// First holding register of the process image on the deployed PLCs.
pub const DEFAULT_BASE_ADDRESS: u16 = 4466;
/// Number of boilers attached to one PLC.
pub const NUMBER_OF_BOILERS: u8 = 3;
/// Upper bound of registers per "Read Holding Registers" request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;
/// Largest chunk the field devices answer reliably.
pub const DEFAULT_MAX_CHUNK: u16 = 14;

/// A contiguous range of holding registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBlock {
    start: u16,
    count: u16,
}

impl RegisterBlock {
    /// Creates a block, rejecting empty ranges and ranges that wrap past `0xFFFF`.
    pub fn new(start: u16, count: u16) -> Result<Self, Error> {
        if count == 0 || start as u32 + count as u32 > 0x1_0000 {
            return Err(Error::BlockOutOfRange {
                start,
                count: count as u32,
            });
        }
        Ok(Self { start, count })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Number of bytes a complete answer for this block carries.
    pub fn byte_len(&self) -> usize {
        self.count as usize * 2
    }

    /// Splits the block into sub-blocks of at most `max_chunk` registers, in
    /// ascending address order.
    pub fn chunks(&self, max_chunk: u16) -> Chunks {
        Chunks {
            next: self.start as u32,
            end: self.start as u32 + self.count as u32,
            max_chunk: max_chunk.max(1) as u32,
        }
    }
}

impl fmt::Display for RegisterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..={}",
            self.start,
            self.start as u32 + self.count as u32 - 1
        )
    }
}

/// Iterator returned by [`RegisterBlock::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks {
    next: u32,
    end: u32,
    max_chunk: u32,
}

impl Iterator for Chunks {
    type Item = RegisterBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let count = (self.end - self.next).min(self.max_chunk);
        let block = RegisterBlock {
            start: self.next as u16,
            count: count as u16,
        };
        self.next += count;
        Some(block)
    }
}

/// The bytes returned for a [`RegisterBlock`].
///
/// A frame always holds exactly two bytes per requested register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    block: RegisterBlock,
    bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(block: RegisterBlock, bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() != block.byte_len() {
            return Err(Error::LengthMismatch {
                expected: block.byte_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self { block, bytes })
    }

    pub fn block(&self) -> RegisterBlock {
        self.block
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The frame interpreted as big-endian 16-bit words.
    pub fn words(&self) -> impl Iterator<Item = u16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
    }
}

/// A single telemetry value of a boiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    ReactorTemp,
    SeparatorTemp,
    FurnaceTemp,
    CondenserTemp,
    AtmTemp,
    ReactorPressure,
    GasTankPressure,
    ProcessStartTime,
    TimeOfReaction,
    ProcessEndTime,
    CoolingEndTime,
    NitrogenPurging,
    CarbonDoorStatus,
    CoCh4Leakage,
    JaaliBlockage,
    MachineMaintenance,
    AutoShutDown,
}

impl Field {
    pub const ALL: [Field; 17] = [
        Field::ReactorTemp,
        Field::SeparatorTemp,
        Field::FurnaceTemp,
        Field::CondenserTemp,
        Field::AtmTemp,
        Field::ReactorPressure,
        Field::GasTankPressure,
        Field::ProcessStartTime,
        Field::TimeOfReaction,
        Field::ProcessEndTime,
        Field::CoolingEndTime,
        Field::NitrogenPurging,
        Field::CarbonDoorStatus,
        Field::CoCh4Leakage,
        Field::JaaliBlockage,
        Field::MachineMaintenance,
        Field::AutoShutDown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::ReactorTemp => "reactorTemp",
            Field::SeparatorTemp => "separatorTemp",
            Field::FurnaceTemp => "furnaceTemp",
            Field::CondenserTemp => "condenserTemp",
            Field::AtmTemp => "atmTemp",
            Field::ReactorPressure => "reactorPressure",
            Field::GasTankPressure => "gasTankPressure",
            Field::ProcessStartTime => "processStartTime",
            Field::TimeOfReaction => "timeOfReaction",
            Field::ProcessEndTime => "processEndTime",
            Field::CoolingEndTime => "coolingEndTime",
            Field::NitrogenPurging => "nitrogenPurging",
            Field::CarbonDoorStatus => "carbonDoorStatus",
            Field::CoCh4Leakage => "coCh4Leakage",
            Field::JaaliBlockage => "jaaliBlockage",
            Field::MachineMaintenance => "machineMaintenance",
            Field::AutoShutDown => "autoShutDown",
        }
    }

    /// Converts the raw register word into the typed value of this field.
    pub fn decode(&self, word: u16) -> FieldValue {
        match self {
            Field::ReactorTemp
            | Field::SeparatorTemp
            | Field::FurnaceTemp
            | Field::CondenserTemp
            | Field::AtmTemp => FieldValue::Temperature(word as i16),
            Field::ReactorPressure | Field::GasTankPressure => FieldValue::Pressure(word as i16),
            Field::ProcessStartTime
            | Field::TimeOfReaction
            | Field::ProcessEndTime
            | Field::CoolingEndTime => FieldValue::Elapsed(ElapsedTime::from_secs(word)),
            Field::NitrogenPurging
            | Field::CarbonDoorStatus
            | Field::CoCh4Leakage
            | Field::JaaliBlockage
            | Field::MachineMaintenance
            | Field::AutoShutDown => FieldValue::Status(StatusCode(word)),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Elapsed seconds counter of the PLC, displayed as `HH:MM:SS`.
///
/// The counter is 16 bits wide and wraps after 65535 seconds (18:12:15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ElapsedTime(u16);

impl ElapsedTime {
    pub const fn from_secs(secs: u16) -> Self {
        Self(secs)
    }

    pub const fn as_secs(&self) -> u16 {
        self.0
    }

    pub const fn hours(&self) -> u16 {
        self.0 / 3600
    }

    pub const fn minutes(&self) -> u16 {
        (self.0 / 60) % 60
    }

    pub const fn seconds(&self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl Serialize for ElapsedTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Raw status word as reported by the PLC. `0` means inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub fn is_active(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded value together with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Temperature(i16),
    Pressure(i16),
    Elapsed(ElapsedTime),
    Status(StatusCode),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Temperature(value) => write!(f, "{value}°C"),
            FieldValue::Pressure(value) => write!(f, "{value}"),
            FieldValue::Elapsed(value) => write!(f, "{value}"),
            FieldValue::Status(value) => write!(f, "{value}"),
        }
    }
}

/// Order of the fields within the register group of one boiler.
///
/// Each field occupies one word; the layout length is the group size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct BoilerLayout(Vec<Field>);

impl BoilerLayout {
    /// The 14 word layout of the current PLC program.
    pub fn compact() -> Self {
        Self(Field::ALL[..14].to_vec())
    }

    /// One word for every known field, 17 words per boiler.
    pub fn full() -> Self {
        Self(Field::ALL.to_vec())
    }

    /// Number of registers one boiler occupies.
    pub fn words(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

impl Default for BoilerLayout {
    fn default() -> Self {
        Self::compact()
    }
}

impl TryFrom<Vec<Field>> for BoilerLayout {
    type Error = Error;

    fn try_from(fields: Vec<Field>) -> Result<Self, Self::Error> {
        if fields.is_empty() {
            return Err(Error::EmptyLayout);
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(Error::DuplicateField(*field));
            }
        }
        Ok(Self(fields))
    }
}

impl From<BoilerLayout> for Vec<Field> {
    fn from(layout: BoilerLayout) -> Self {
        layout.0
    }
}

/// Telemetry of a single boiler for one poll cycle.
///
/// Fields that are not part of the configured [`BoilerLayout`] stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoilerReading {
    pub id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactor_temp: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator_temp: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub furnace_temp: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condenser_temp: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atm_temp: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactor_pressure: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_tank_pressure: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_start_time: Option<ElapsedTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_reaction: Option<ElapsedTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_end_time: Option<ElapsedTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooling_end_time: Option<ElapsedTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nitrogen_purging: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbon_door_status: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co_ch4_leakage: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jaali_blockage: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_maintenance: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_shut_down: Option<StatusCode>,
}

impl BoilerReading {
    fn from_words(id: u8, layout: &BoilerLayout, words: &[u16]) -> Self {
        let mut reading = BoilerReading {
            id,
            ..Default::default()
        };
        for (field, word) in layout.fields().iter().zip(words) {
            reading.set(*field, *word);
        }
        reading
    }

    fn set(&mut self, field: Field, word: u16) {
        match field.decode(word) {
            FieldValue::Temperature(value) | FieldValue::Pressure(value) => {
                if let Some(slot) = self.signed_mut(field) {
                    *slot = Some(value);
                }
            }
            FieldValue::Elapsed(value) => {
                if let Some(slot) = self.elapsed_mut(field) {
                    *slot = Some(value);
                }
            }
            FieldValue::Status(value) => {
                if let Some(slot) = self.status_mut(field) {
                    *slot = Some(value);
                }
            }
        }
    }

    fn signed_mut(&mut self, field: Field) -> Option<&mut Option<i16>> {
        match field {
            Field::ReactorTemp => Some(&mut self.reactor_temp),
            Field::SeparatorTemp => Some(&mut self.separator_temp),
            Field::FurnaceTemp => Some(&mut self.furnace_temp),
            Field::CondenserTemp => Some(&mut self.condenser_temp),
            Field::AtmTemp => Some(&mut self.atm_temp),
            Field::ReactorPressure => Some(&mut self.reactor_pressure),
            Field::GasTankPressure => Some(&mut self.gas_tank_pressure),
            _ => None,
        }
    }

    fn elapsed_mut(&mut self, field: Field) -> Option<&mut Option<ElapsedTime>> {
        match field {
            Field::ProcessStartTime => Some(&mut self.process_start_time),
            Field::TimeOfReaction => Some(&mut self.time_of_reaction),
            Field::ProcessEndTime => Some(&mut self.process_end_time),
            Field::CoolingEndTime => Some(&mut self.cooling_end_time),
            _ => None,
        }
    }

    fn status_mut(&mut self, field: Field) -> Option<&mut Option<StatusCode>> {
        match field {
            Field::NitrogenPurging => Some(&mut self.nitrogen_purging),
            Field::CarbonDoorStatus => Some(&mut self.carbon_door_status),
            Field::CoCh4Leakage => Some(&mut self.co_ch4_leakage),
            Field::JaaliBlockage => Some(&mut self.jaali_blockage),
            Field::MachineMaintenance => Some(&mut self.machine_maintenance),
            Field::AutoShutDown => Some(&mut self.auto_shut_down),
            _ => None,
        }
    }

    /// Returns the value of `field`, if the layout provided it.
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::ReactorTemp => self.reactor_temp.map(FieldValue::Temperature),
            Field::SeparatorTemp => self.separator_temp.map(FieldValue::Temperature),
            Field::FurnaceTemp => self.furnace_temp.map(FieldValue::Temperature),
            Field::CondenserTemp => self.condenser_temp.map(FieldValue::Temperature),
            Field::AtmTemp => self.atm_temp.map(FieldValue::Temperature),
            Field::ReactorPressure => self.reactor_pressure.map(FieldValue::Pressure),
            Field::GasTankPressure => self.gas_tank_pressure.map(FieldValue::Pressure),
            Field::ProcessStartTime => self.process_start_time.map(FieldValue::Elapsed),
            Field::TimeOfReaction => self.time_of_reaction.map(FieldValue::Elapsed),
            Field::ProcessEndTime => self.process_end_time.map(FieldValue::Elapsed),
            Field::CoolingEndTime => self.cooling_end_time.map(FieldValue::Elapsed),
            Field::NitrogenPurging => self.nitrogen_purging.map(FieldValue::Status),
            Field::CarbonDoorStatus => self.carbon_door_status.map(FieldValue::Status),
            Field::CoCh4Leakage => self.co_ch4_leakage.map(FieldValue::Status),
            Field::JaaliBlockage => self.jaali_blockage.map(FieldValue::Status),
            Field::MachineMaintenance => self.machine_maintenance.map(FieldValue::Status),
            Field::AutoShutDown => self.auto_shut_down.map(FieldValue::Status),
        }
    }
}

impl fmt::Display for BoilerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Boiler {}:", self.id)?;
        let mut first = true;
        for field in Field::ALL {
            if let Some(value) = self.get(field) {
                write!(f, "{} {field}={value}", if first { "" } else { "," })?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Decodes `frame` into one reading per boiler group.
///
/// Boilers are numbered from 1 in register order. Groups that do not fit
/// completely into the frame are left out; a frame without a single complete
/// group yields [`Error::InsufficientData`].
pub fn decode(
    frame: &RawFrame,
    layout: &BoilerLayout,
    boilers: u8,
) -> Result<Vec<BoilerReading>, Error> {
    let words: Vec<u16> = frame.words().collect();
    let group = layout.words();
    if words.len() < group {
        return Err(Error::InsufficientData {
            required: group,
            actual: words.len(),
        });
    }
    Ok(words
        .chunks_exact(group)
        .take(boilers as usize)
        .zip(1..=boilers)
        .map(|(words, id)| BoilerReading::from_words(id, layout, words))
        .collect())
}

/// Where the process image lives and how it is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMap {
    pub base_address: u16,
    pub boilers: u8,
    pub layout: BoilerLayout,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
            boilers: NUMBER_OF_BOILERS,
            layout: BoilerLayout::default(),
        }
    }
}

impl RegisterMap {
    /// The register block spanning all boilers.
    pub fn block(&self) -> Result<RegisterBlock, Error> {
        let span = self.boilers as usize * self.layout.words();
        let count = u16::try_from(span).map_err(|_| Error::BlockOutOfRange {
            start: self.base_address,
            count: span as u32,
        })?;
        RegisterBlock::new(self.base_address, count)
    }

    pub fn decode(&self, frame: &RawFrame) -> Result<Vec<BoilerReading>, Error> {
        decode(frame, &self.layout, self.boilers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn frame_from_words(start: u16, words: &[u16]) -> RawFrame {
        let block = RegisterBlock::new(start, words.len() as u16).unwrap();
        let bytes = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        RawFrame::new(block, bytes).unwrap()
    }

    fn fixture_words() -> Vec<u16> {
        (0..42u16)
            .map(|i| match i % 14 {
                // negative temperature on every atm sensor
                4 => 0xFFF6,
                _ => (i / 14 + 1) * 1000 + i % 14,
            })
            .collect()
    }

    #[test]
    fn elapsed_time_formatting() {
        assert_eq!(ElapsedTime::from_secs(0).to_string(), "00:00:00");
        assert_eq!(ElapsedTime::from_secs(59).to_string(), "00:00:59");
        assert_eq!(ElapsedTime::from_secs(3661).to_string(), "01:01:01");
        assert_eq!(ElapsedTime::from_secs(36000).to_string(), "10:00:00");
        // counter maximum
        assert_eq!(ElapsedTime::from_secs(65535).to_string(), "18:12:15");
    }

    #[test]
    fn field_decode_is_signed_for_temperatures() {
        assert_eq!(Field::AtmTemp.decode(0xFFFF), FieldValue::Temperature(-1));
        assert_eq!(Field::ReactorPressure.decode(0x8000), FieldValue::Pressure(i16::MIN));
        assert_eq!(
            Field::TimeOfReaction.decode(0xFFFF),
            FieldValue::Elapsed(ElapsedTime::from_secs(u16::MAX))
        );
        assert_eq!(Field::AutoShutDown.decode(2), FieldValue::Status(StatusCode(2)));
    }

    #[test]
    fn reading_stores_decoded_value_of_every_field() {
        for (index, field) in Field::ALL.iter().enumerate() {
            let word = 0xFF00 | index as u16;
            let layout = BoilerLayout::try_from(vec![*field]).unwrap();
            let reading = BoilerReading::from_words(1, &layout, &[word]);

            assert_eq!(reading.get(*field), Some(field.decode(word)));
            assert!(Field::ALL
                .iter()
                .filter(|other| *other != field)
                .all(|other| reading.get(*other).is_none()));
        }
    }

    #[test]
    fn register_block_bounds() {
        assert_matches!(RegisterBlock::new(0, 0), Err(Error::BlockOutOfRange { .. }));
        assert_matches!(RegisterBlock::new(0xFFFF, 2), Err(Error::BlockOutOfRange { .. }));
        assert_eq!(RegisterBlock::new(0xFFFF, 1).unwrap().byte_len(), 2);
        assert_eq!(RegisterBlock::new(4466, 42).unwrap().to_string(), "4466..=4507");
    }

    #[test]
    fn chunks_cover_block_in_order() {
        let block = RegisterBlock::new(4466, 42).unwrap();
        let chunks: Vec<_> = block.chunks(14).map(|c| (c.start(), c.count())).collect();
        assert_eq!(chunks, vec![(4466, 14), (4480, 14), (4494, 14)]);

        let chunks: Vec<_> = block.chunks(10).map(|c| (c.start(), c.count())).collect();
        assert_eq!(
            chunks,
            vec![(4466, 10), (4476, 10), (4486, 10), (4496, 10), (4506, 2)]
        );

        let top = RegisterBlock::new(0xFFF0, 16).unwrap();
        assert_eq!(top.chunks(125).count(), 1);
    }

    #[test]
    fn raw_frame_rejects_wrong_length() {
        let block = RegisterBlock::new(4466, 42).unwrap();
        assert_matches!(
            RawFrame::new(block, vec![0; 80]),
            Err(Error::LengthMismatch {
                expected: 84,
                actual: 80
            })
        );
        assert!(RawFrame::new(block, vec![0; 84]).is_ok());
    }

    #[test]
    fn decode_three_boilers() {
        let words = fixture_words();
        let frame = frame_from_words(4466, &words);
        let readings = RegisterMap::default().decode(&frame).unwrap();

        assert_eq!(readings.len(), 3);
        for (index, reading) in readings.iter().enumerate() {
            assert_eq!(reading.id as usize, index + 1);
            let group = &words[index * 14..(index + 1) * 14];
            for (field, word) in BoilerLayout::compact().fields().iter().zip(group) {
                assert_eq!(reading.get(*field), Some(field.decode(*word)));
            }
        }
        assert_eq!(readings[0].reactor_temp, Some(1000));
        assert_eq!(readings[1].atm_temp, Some(-10));
        assert_eq!(readings[2].gas_tank_pressure, Some(3006));
        assert_eq!(
            readings[2].process_start_time,
            Some(ElapsedTime::from_secs(3007))
        );
        assert_eq!(readings[0].co_ch4_leakage, Some(StatusCode(1013)));
        assert_eq!(readings[0].jaali_blockage, None);
    }

    #[test]
    fn decode_omits_incomplete_groups() {
        let words = fixture_words();
        let frame = frame_from_words(4466, &words[..40]);
        let readings = RegisterMap::default().decode(&frame).unwrap();
        assert_eq!(readings.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn decode_needs_one_complete_group() {
        let frame = frame_from_words(4466, &[0; 13]);
        assert_matches!(
            RegisterMap::default().decode(&frame),
            Err(Error::InsufficientData {
                required: 14,
                actual: 13
            })
        );
    }

    #[test]
    fn decode_full_layout() {
        let map = RegisterMap {
            layout: BoilerLayout::full(),
            ..Default::default()
        };
        assert_eq!(map.block().unwrap().count(), 51);
        let words: Vec<u16> = (1..=51).collect();
        let readings = map.decode(&frame_from_words(map.base_address, &words)).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[2].auto_shut_down, Some(StatusCode(51)));
        assert!(Field::ALL.iter().all(|f| readings[0].get(*f).is_some()));
    }

    #[test]
    fn layout_validation() {
        assert_matches!(BoilerLayout::try_from(vec![]), Err(Error::EmptyLayout));
        assert_matches!(
            BoilerLayout::try_from(vec![Field::AtmTemp, Field::ReactorTemp, Field::AtmTemp]),
            Err(Error::DuplicateField(Field::AtmTemp))
        );
        assert_eq!(BoilerLayout::compact().words(), 14);
        assert_eq!(BoilerLayout::full().words(), 17);
    }

    #[test]
    fn register_map_default_block() {
        let block = RegisterMap::default().block().unwrap();
        assert_eq!((block.start(), block.count()), (4466, 42));

        let oversized = RegisterMap {
            boilers: 255,
            layout: BoilerLayout::full(),
            base_address: 0,
        };
        assert!(oversized.block().is_ok());
        let wrapped = RegisterMap {
            base_address: 0xFFF0,
            ..Default::default()
        };
        assert_matches!(wrapped.block(), Err(Error::BlockOutOfRange { .. }));
    }

    #[test]
    fn reading_display_and_json() {
        let words = fixture_words();
        let readings = RegisterMap::default()
            .decode(&frame_from_words(4466, &words))
            .unwrap();
        let text = readings[0].to_string();
        assert!(text.starts_with("Boiler 1: reactorTemp=1000°C, separatorTemp=1001°C"));
        assert!(text.contains("processStartTime=00:16:47"));

        let json = serde_json::to_value(&readings[0]).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["atmTemp"], -10);
        assert_eq!(json["processStartTime"], "00:16:47");
        assert_eq!(json["nitrogenPurging"], 1011);
        assert!(json.get("autoShutDown").is_none());
    }
}
