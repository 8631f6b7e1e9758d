use anyhow::{Context, Result};
use fmesh_core::{parse_snapshot, Message, SnapshotUpdate};
use fmesh_transport::SnapshotReceiver;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::engine::{DirListing, HeartbeatEngine, UdpOutbound, UniformJitter};
use crate::view::ClusterView;

/// Wires the two long-lived units together: the self-rescheduling
/// heartbeat engine and the snapshot receive loop, with the receive loop
/// handing decoded messages to a consumer task over a channel.
pub struct Daemon {
    config: Config,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tasks: Vec::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        fmesh_core::init();
        fmesh_transport::init();

        let server = self.config.server_addr()?;
        info!("rendezvous server: {}", server);

        let engine = HeartbeatEngine::new(
            self.config.node.address.clone(),
            Box::new(DirListing::new(&self.config.node.share_dir)),
            Box::new(UniformJitter),
            Box::new(UdpOutbound::new(server)),
        );

        let listen = self.config.listen_addr();
        let receiver = SnapshotReceiver::bind(listen)
            .await
            .with_context(|| format!("binding snapshot listener on {}", listen))?;
        info!(
            "listening for snapshots on {}",
            receiver.local_addr().context("snapshot listener address")?
        );

        let (updates_tx, mut updates_rx) = mpsc::channel::<Message>(64);

        self.tasks.push(tokio::spawn(engine.run()));
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = receiver.run(updates_tx).await {
                error!("snapshot receive loop ended: {}", e);
            }
        }));
        self.tasks.push(tokio::spawn(async move {
            let mut view = ClusterView::new();
            while let Some(message) = updates_rx.recv().await {
                apply_snapshot(&mut view, &message);
            }
        }));

        Ok(())
    }

    /// Abort the background tasks. Each is independently cancellable; none
    /// holds state that needs a graceful handoff.
    pub fn stop(&mut self) {
        info!("stopping fmeshd tasks");
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn apply_snapshot(view: &mut ClusterView, message: &Message) {
    match parse_snapshot(&message.payload) {
        SnapshotUpdate::NoUpdate => {
            info!("snapshot from {}: no update", message.origin_ip);
        }
        SnapshotUpdate::Nodes { entries, skipped } => {
            if skipped > 0 {
                warn!(
                    "snapshot from {}: skipped {} malformed entries",
                    message.origin_ip, skipped
                );
            }
            view.replace(message.timestamp, entries);
            info!(
                "cluster view updated from {}: {} nodes as of {}",
                message.origin_ip,
                view.len(),
                view.updated_at()
            );
            if log::log_enabled!(log::Level::Debug) {
                match serde_json::to_string(view) {
                    Ok(json) => debug!("cluster view: {}", json),
                    Err(e) => debug!("cluster view not serializable: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(payload: &str) -> Message {
        Message::new(0, "10.0.0.1", 1_700_000_000, payload)
    }

    #[test]
    fn test_apply_snapshot_replaces_view() {
        let mut view = ClusterView::new();
        apply_snapshot(&mut view, &snapshot("10.0.0.2:available:a.txt"));
        apply_snapshot(
            &mut view,
            &snapshot("10.0.0.3:available:b.txt;10.0.0.4:down:"),
        );

        assert_eq!(view.len(), 2);
        assert!(view.get("10.0.0.2").is_none());
        assert_eq!(view.get("10.0.0.4").unwrap().status, "down");
    }

    #[test]
    fn test_no_update_leaves_view_untouched() {
        let mut view = ClusterView::new();
        apply_snapshot(&mut view, &snapshot("10.0.0.2:available:a.txt"));
        apply_snapshot(&mut view, &snapshot(""));

        assert_eq!(view.len(), 1);
        assert_eq!(view.get("10.0.0.2").unwrap().files, "a.txt");
    }

    #[test]
    fn test_malformed_entries_do_not_poison_update() {
        let mut view = ClusterView::new();
        apply_snapshot(&mut view, &snapshot("badentry;10.0.0.4:ok:x"));

        assert_eq!(view.len(), 1);
        assert_eq!(view.get("10.0.0.4").unwrap().status, "ok");
    }
}
