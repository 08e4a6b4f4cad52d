pub mod packet;
pub mod tlv;
pub mod types;

pub use packet::{compute_snr_db, CommandBuilder, StatusPacket};
pub use types::{DemodType, FieldCode, OutputEncoding, CMD, STATUS};
