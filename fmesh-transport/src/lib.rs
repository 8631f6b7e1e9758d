use log::info;

pub mod udp;

pub use udp::{send_heartbeat, SnapshotReceiver, RECV_BUFFER_SIZE};

pub fn init() {
    info!("fmesh Transport initialized");
}
