//! Binary wire protocol spoken by the embedded boards.

pub mod codec;
pub mod packets;

pub use codec::{ProtocolError, saturate_i32};
pub use packets::{
    ABSENT, BuildingTablePacket, ConnectedConsumption, ConnectedProduction, PlantSetPoint,
    PollResponse, PowerData, RegistrationRequest, RegistrationResponse, TableEntry,
    TimedPowerData,
};
