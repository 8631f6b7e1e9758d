use log::info;

pub mod message;
pub mod snapshot;

pub use message::{CodecError, Message, MIN_MESSAGE_LEN};
pub use snapshot::{parse_snapshot, NodeEntry, SnapshotUpdate};

pub fn init() {
    info!("fmesh Core initialized");
}
