//! Fixed-layout device packets.
//!
//! Every multi-byte integer is big-endian. Constructors enforce the wire limits
//! (u8 counts, 255-byte messages), so `encode` never fails; `decode` rejects any
//! input whose length disagrees with the layout.

use super::codec::{
    ProtocolError, Reader, ascii, expect_len, get_fixed_str, put_fixed_str, wire_count,
};

/// Sentinel marking a power field as "not present".
pub const ABSENT: i32 = 0x7FFF_FFFF;

fn present(value: i32) -> Option<i32> {
    (value != ABSENT).then_some(value)
}

/// Production and consumption report in milliwatts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerData {
    pub production: i32,
    pub consumption: i32,
}

impl PowerData {
    pub const SIZE: usize = 8;
    const NAME: &'static str = "PowerData";

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.production.to_be_bytes());
        out.extend_from_slice(&self.consumption.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(Self::NAME, bytes, Self::SIZE)?;
        let mut r = Reader::new(Self::NAME, bytes);
        let production = r.i32()?;
        let consumption = r.i32()?;
        r.finish()?;
        Ok(Self {
            production,
            consumption,
        })
    }

    /// Production, or `None` when the device sent the absent sentinel.
    pub fn production(&self) -> Option<i32> {
        present(self.production)
    }

    /// Consumption, or `None` when the device sent the absent sentinel.
    pub fn consumption(&self) -> Option<i32> {
        present(self.consumption)
    }
}

/// [`PowerData`] followed by the device clock as unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedPowerData {
    pub power: PowerData,
    pub timestamp: u64,
}

impl TimedPowerData {
    pub const SIZE: usize = 16;
    const NAME: &'static str = "TimedPowerData";

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.power.encode();
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(Self::NAME, bytes, Self::SIZE)?;
        let mut r = Reader::new(Self::NAME, bytes);
        let production = r.i32()?;
        let consumption = r.i32()?;
        let timestamp = r.u64()?;
        r.finish()?;
        Ok(Self {
            power: PowerData {
                production,
                consumption,
            },
            timestamp,
        })
    }
}

/// Optional identity fields a board may send when registering.
///
/// An empty body means the board relies entirely on its bearer identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationRequest {
    pub display_name: Option<String>,
    pub board_type: Option<String>,
}

impl RegistrationRequest {
    pub const NAME_WIDTH: usize = 32;
    pub const TYPE_WIDTH: usize = 16;
    pub const SIZE: usize = Self::NAME_WIDTH + Self::TYPE_WIDTH;
    const NAME: &'static str = "RegistrationRequest";

    pub fn encode(&self) -> Vec<u8> {
        if self.display_name.is_none() && self.board_type.is_none() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(Self::SIZE);
        put_fixed_str(
            &mut out,
            self.display_name.as_deref().unwrap_or_default(),
            Self::NAME_WIDTH,
        );
        put_fixed_str(
            &mut out,
            self.board_type.as_deref().unwrap_or_default(),
            Self::TYPE_WIDTH,
        );
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        expect_len(Self::NAME, bytes, Self::SIZE)?;
        let mut r = Reader::new(Self::NAME, bytes);
        let name = get_fixed_str(&mut r, Self::NAME_WIDTH, "display_name")?;
        let kind = get_fixed_str(&mut r, Self::TYPE_WIDTH, "board_type")?;
        r.finish()?;
        Ok(Self {
            display_name: (!name.is_empty()).then_some(name),
            board_type: (!kind.is_empty()).then_some(kind),
        })
    }
}

/// Outcome of a registration, with a short ASCII message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResponse {
    success: bool,
    message: String,
}

impl RegistrationResponse {
    pub const MAX_MESSAGE: usize = 255;
    const NAME: &'static str = "RegistrationResponse";

    /// Builds a response; non-ASCII characters become `?` and the message is
    /// cut to 255 bytes.
    pub fn new(success: bool, message: &str) -> Self {
        let message = message
            .chars()
            .map(|c| if c.is_ascii() { c } else { '?' })
            .take(Self::MAX_MESSAGE)
            .collect();
        Self { success, message }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.message.len());
        out.push(u8::from(self.success));
        // `new` bounds the message to 255 ASCII bytes.
        out.push(self.message.len() as u8);
        out.extend_from_slice(self.message.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(Self::NAME, bytes);
        let success = match r.u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(ProtocolError::InvalidField {
                    packet: Self::NAME,
                    field: "success",
                });
            }
        };
        let len = r.counted(1, true)?;
        let message = ascii(Self::NAME, "message", r.bytes(usize::from(len))?)?;
        r.finish()?;
        Ok(Self { success, message })
    }
}

/// One connected power plant and the output the team set on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantSetPoint {
    pub plant_id: u32,
    pub set_power: i32,
}

/// Full snapshot of the power plants wired to a board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectedProduction {
    plants: Vec<PlantSetPoint>,
}

impl ConnectedProduction {
    const NAME: &'static str = "ConnectedProduction";
    const STRIDE: usize = 8;

    pub fn new(plants: Vec<PlantSetPoint>) -> Result<Self, ProtocolError> {
        wire_count(Self::NAME, plants.len())?;
        Ok(Self { plants })
    }

    pub fn plants(&self) -> &[PlantSetPoint] {
        &self.plants
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + Self::STRIDE * self.plants.len());
        out.push(self.plants.len() as u8);
        for p in &self.plants {
            out.extend_from_slice(&p.plant_id.to_be_bytes());
            out.extend_from_slice(&p.set_power.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(Self::NAME, bytes);
        let count = r.counted(Self::STRIDE, true)?;
        let mut plants = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            plants.push(PlantSetPoint {
                plant_id: r.u32()?,
                set_power: r.i32()?,
            });
        }
        r.finish()?;
        Ok(Self { plants })
    }
}

/// Full snapshot of the consumers wired to a board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectedConsumption {
    consumer_ids: Vec<u32>,
}

impl ConnectedConsumption {
    const NAME: &'static str = "ConnectedConsumption";
    const STRIDE: usize = 4;

    pub fn new(consumer_ids: Vec<u32>) -> Result<Self, ProtocolError> {
        wire_count(Self::NAME, consumer_ids.len())?;
        Ok(Self { consumer_ids })
    }

    pub fn consumer_ids(&self) -> &[u32] {
        &self.consumer_ids
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + Self::STRIDE * self.consumer_ids.len());
        out.push(self.consumer_ids.len() as u8);
        for id in &self.consumer_ids {
            out.extend_from_slice(&id.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(Self::NAME, bytes);
        let count = r.counted(Self::STRIDE, true)?;
        let mut consumer_ids = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            consumer_ids.push(r.u32()?);
        }
        r.finish()?;
        Ok(Self { consumer_ids })
    }
}

/// A `(type id, value)` pair as used by coefficient and building tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub id: u8,
    pub value: i32,
}

const ENTRY_STRIDE: usize = 5;

fn put_entries(out: &mut Vec<u8>, entries: &[TableEntry]) {
    out.push(entries.len() as u8);
    for e in entries {
        out.push(e.id);
        out.extend_from_slice(&e.value.to_be_bytes());
    }
}

fn get_entries(r: &mut Reader<'_>, exact: bool) -> Result<Vec<TableEntry>, ProtocolError> {
    let count = r.counted(ENTRY_STRIDE, exact)?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        entries.push(TableEntry {
            id: r.u8()?,
            value: r.i32()?,
        });
    }
    Ok(entries)
}

/// Coefficients of the current round as seen by a polling board.
///
/// Production values are fixed-point milli-units (`1000` = coefficient 1.0);
/// consumption values are per-building consumption in milliwatts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollResponse {
    production: Vec<TableEntry>,
    consumption: Vec<TableEntry>,
}

impl PollResponse {
    const NAME: &'static str = "PollResponse";

    pub fn new(
        production: Vec<TableEntry>,
        consumption: Vec<TableEntry>,
    ) -> Result<Self, ProtocolError> {
        wire_count(Self::NAME, production.len())?;
        wire_count(Self::NAME, consumption.len())?;
        Ok(Self {
            production,
            consumption,
        })
    }

    pub fn production(&self) -> &[TableEntry] {
        &self.production
    }

    pub fn consumption(&self) -> &[TableEntry] {
        &self.consumption
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            2 + ENTRY_STRIDE * (self.production.len() + self.consumption.len()),
        );
        put_entries(&mut out, &self.production);
        put_entries(&mut out, &self.consumption);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(Self::NAME, bytes);
        let production = get_entries(&mut r, false)?;
        let consumption = get_entries(&mut r, true)?;
        r.finish()?;
        Ok(Self {
            production,
            consumption,
        })
    }
}

/// Versioned base consumption table (milliwatts per building type).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildingTablePacket {
    version: u32,
    entries: Vec<TableEntry>,
}

impl BuildingTablePacket {
    const NAME: &'static str = "BuildingTable";

    pub fn new(version: u32, entries: Vec<TableEntry>) -> Result<Self, ProtocolError> {
        wire_count(Self::NAME, entries.len())?;
        Ok(Self { version, entries })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + ENTRY_STRIDE * self.entries.len());
        out.extend_from_slice(&self.version.to_be_bytes());
        put_entries(&mut out, &self.entries);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(Self::NAME, bytes);
        let version = r.u32()?;
        let entries = get_entries(&mut r, true)?;
        r.finish()?;
        Ok(Self { version, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_data_layout_is_big_endian() {
        let p = PowerData {
            production: 1000,
            consumption: -1,
        };
        assert_eq!(p.encode(), vec![0, 0, 0x03, 0xE8, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn power_data_sentinel_round_trips_as_absent() {
        let p = PowerData {
            production: ABSENT,
            consumption: 800,
        };
        let decoded = PowerData::decode(&p.encode()).expect("decode");
        assert_eq!(decoded, p);
        assert_eq!(decoded.production(), None);
        assert_eq!(decoded.consumption(), Some(800));
    }

    #[test]
    fn power_data_rejects_wrong_length() {
        assert!(PowerData::decode(&[0; 7]).is_err());
        assert!(PowerData::decode(&[0; 9]).is_err());
    }

    #[test]
    fn timed_power_data_round_trip() {
        let p = TimedPowerData {
            power: PowerData {
                production: 5,
                consumption: 6,
            },
            timestamp: 1_700_000_000,
        };
        let bytes = p.encode();
        assert_eq!(bytes.len(), TimedPowerData::SIZE);
        assert_eq!(TimedPowerData::decode(&bytes), Ok(p));
    }

    #[test]
    fn connected_production_count_mismatch_is_rejected() {
        // count=3 needs 24 payload bytes (25 total) but only 16 follow.
        let mut bytes = vec![3u8];
        bytes.extend_from_slice(&[0u8; 16]);
        let err = ConnectedProduction::decode(&bytes).expect_err("must reject");
        assert_eq!(
            err,
            ProtocolError::CountMismatch {
                packet: "ConnectedProduction",
                count: 3,
                expected: 24,
                actual: 16
            }
        );
    }

    #[test]
    fn connected_production_rejects_trailing_bytes() {
        let mut bytes = ConnectedProduction::new(vec![PlantSetPoint {
            plant_id: 1,
            set_power: 2,
        }])
        .expect("one plant")
        .encode();
        bytes.push(0);
        assert!(ConnectedProduction::decode(&bytes).is_err());
    }

    #[test]
    fn connected_production_boundary_counts() {
        let empty = ConnectedProduction::new(Vec::new()).expect("empty");
        assert_eq!(empty.encode(), vec![0]);
        assert_eq!(ConnectedProduction::decode(&[0]), Ok(empty));

        let full: Vec<PlantSetPoint> = (0..255)
            .map(|i| PlantSetPoint {
                plant_id: i,
                set_power: ABSENT,
            })
            .collect();
        let packet = ConnectedProduction::new(full).expect("255 plants");
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 1 + 8 * 255);
        assert_eq!(ConnectedProduction::decode(&bytes), Ok(packet));
    }

    #[test]
    fn too_many_entries_are_refused_at_construction() {
        let ids: Vec<u32> = (0..256).collect();
        assert!(matches!(
            ConnectedConsumption::new(ids),
            Err(ProtocolError::TooManyEntries { count: 256, .. })
        ));
    }

    #[test]
    fn connected_consumption_round_trip() {
        let packet = ConnectedConsumption::new(vec![1, 2, u32::MAX]).expect("three");
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 1 + 4 * 3);
        assert_eq!(ConnectedConsumption::decode(&bytes), Ok(packet));
    }

    #[test]
    fn connected_consumption_boundary_counts() {
        let empty = ConnectedConsumption::new(Vec::new()).expect("empty");
        assert_eq!(empty.encode(), vec![0]);
        assert_eq!(ConnectedConsumption::decode(&[0]), Ok(empty));

        let packet = ConnectedConsumption::new((0..255).collect()).expect("255 consumers");
        let bytes = packet.encode();
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes.len(), 1 + 4 * 255);
        assert_eq!(&bytes[bytes.len() - 4..], &254u32.to_be_bytes());
        assert_eq!(ConnectedConsumption::decode(&bytes), Ok(packet));
        assert!(ConnectedConsumption::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn registration_response_layout() {
        let r = RegistrationResponse::new(true, "OK");
        assert_eq!(r.encode(), vec![1, 2, b'O', b'K']);
        assert_eq!(RegistrationResponse::decode(&r.encode()), Ok(r));
    }

    #[test]
    fn registration_response_rejects_bad_success_byte_and_length() {
        assert!(RegistrationResponse::decode(&[2, 0]).is_err());
        assert!(RegistrationResponse::decode(&[1, 3, b'a']).is_err());
        assert!(RegistrationResponse::decode(&[1]).is_err());
    }

    #[test]
    fn registration_response_truncates_long_messages() {
        let long = "x".repeat(400);
        let r = RegistrationResponse::new(false, &long);
        assert_eq!(r.message().len(), 255);
        let bytes = r.encode();
        assert_eq!(bytes[1], 255);
        assert_eq!(RegistrationResponse::decode(&bytes), Ok(r));
    }

    #[test]
    fn registration_request_empty_and_full() {
        assert_eq!(
            RegistrationRequest::decode(&[]),
            Ok(RegistrationRequest::default())
        );
        let req = RegistrationRequest {
            display_name: Some("Team 1".into()),
            board_type: Some("solar".into()),
        };
        let bytes = req.encode();
        assert_eq!(bytes.len(), RegistrationRequest::SIZE);
        assert_eq!(RegistrationRequest::decode(&bytes), Ok(req));
        assert!(RegistrationRequest::decode(&bytes[..10]).is_err());
    }

    #[test]
    fn poll_response_layout_and_round_trip() {
        let packet = PollResponse::new(
            vec![TableEntry { id: 1, value: 1500 }],
            vec![
                TableEntry { id: 2, value: 250 },
                TableEntry { id: 3, value: -1 },
            ],
        )
        .expect("small tables");
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 2 + 5 * 3);
        assert_eq!(&bytes[..6], &[1, 1, 0, 0, 0x05, 0xDC]);
        assert_eq!(PollResponse::decode(&bytes), Ok(packet));
    }

    #[test]
    fn poll_response_rejects_missing_consumption_section() {
        let bytes = [1, 1, 0, 0, 0, 1];
        assert!(PollResponse::decode(&bytes).is_err());
        let empty = PollResponse::default().encode();
        assert_eq!(empty, vec![0, 0]);
        assert_eq!(PollResponse::decode(&empty), Ok(PollResponse::default()));
    }

    #[test]
    fn poll_response_full_tables() {
        let table = |sign: i32| -> Vec<TableEntry> {
            (0..=254u8)
                .map(|id| TableEntry {
                    id,
                    value: sign * i32::from(id),
                })
                .collect()
        };
        let packet = PollResponse::new(table(1), table(-1)).expect("255 entries per side");
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 2 + 5 * 255 * 2);
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes[1 + 5 * 255], 255);
        let decoded = PollResponse::decode(&bytes).expect("round trip");
        assert_eq!(decoded.production().len(), 255);
        assert_eq!(decoded.consumption()[254], TableEntry { id: 254, value: -254 });
        assert_eq!(decoded, packet);

        let mut too_many = table(1);
        too_many.push(TableEntry { id: 0, value: 0 });
        assert!(PollResponse::new(too_many, Vec::new()).is_err());
    }

    #[test]
    fn building_table_round_trip() {
        let packet =
            BuildingTablePacket::new(7, vec![TableEntry { id: 1, value: 25_000 }]).expect("one");
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 5 + 5);
        assert_eq!(BuildingTablePacket::decode(&bytes), Ok(packet));
    }
}
