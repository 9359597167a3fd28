mod error;
mod mutations;
mod queries;

pub use error::*;
pub use queries::{KitchenFilter, ProjectorFilter};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::calendar::Calendar;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type ConfigTable = HashMap<String, ConfigEntry>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Stats {
        response: oneshot::Sender<WalStats>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalStats {
    pub appends_since_compact: u64,
    pub bytes_since_compact: u64,
}

/// Background task that owns the WAL and batches appends for group commit:
/// take the first append, drain whatever else is already queued, then fsync
/// once and answer every sender with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL flush failed for {} events: {e}", batch.len());
        }
        for (_, tx) in batch {
            let _ = tx.send(match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            });
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after an append error so a half-written batch is not left
    // sitting in the buffer for the next one.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::Stats { response } => {
            let _ = response.send(WalStats {
                appends_since_compact: wal.appends_since_compact(),
                bytes_since_compact: wal.bytes_since_compact(),
            });
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

// ── Applying events ──────────────────────────────────────

pub(super) fn apply_to_directory(dir: &mut Directory, event: &Event) {
    match event {
        Event::ResidentCreated { resident } => {
            dir.by_key.insert(
                (resident.name.clone(), resident.room_number.clone()),
                resident.id,
            );
            dir.residents.insert(resident.id, resident.clone());
        }
        Event::PhoneUpdated { resident_id, phone } => {
            if let Some(r) = dir.residents.get_mut(resident_id) {
                r.phone = phone.clone();
            }
        }
        Event::AdminGranted { resident_id, granted_at } => {
            dir.admins.insert(*resident_id, *granted_at);
        }
        Event::AdminRevoked { resident_id } => {
            dir.admins.remove(resident_id);
        }
        Event::ResidentBlocked { block } => {
            dir.blocks.insert(block.resident_id, block.clone());
        }
        Event::ResidentUnblocked { resident_id } => {
            dir.blocks.remove(resident_id);
        }
        _ => {}
    }
}

pub(super) fn apply_to_kitchen(ledger: &mut KitchenLedger, event: &Event) {
    match event {
        Event::KitchenBooked { booking } => ledger.insert(booking.clone()),
        Event::KitchenCancelled { id } => {
            ledger.remove(id);
        }
        _ => {}
    }
}

pub(super) fn apply_to_projector(ledger: &mut ProjectorLedger, event: &Event) {
    match event {
        Event::ProjectorBooked { booking } => ledger.insert(booking.clone()),
        Event::ProjectorCancelled { id } => {
            ledger.remove(id);
        }
        _ => {}
    }
}

pub(super) fn apply_to_config(config: &mut ConfigTable, event: &Event) {
    if let Event::ConfigSet { entry } = event {
        config.insert(entry.key.clone(), entry.clone());
    }
}

/// The persistence collaborator: residents, role and block tags, both booking
/// ledgers and the configuration table, rebuilt from the WAL on open.
///
/// Lock order is directory → kitchen → projector → config; every path that
/// takes more than one lock takes them in that order.
pub struct Store {
    pub(super) directory: RwLock<Directory>,
    pub(super) kitchen: RwLock<KitchenLedger>,
    pub(super) projector: RwLock<ProjectorLedger>,
    pub(super) config: RwLock<ConfigTable>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) calendar: Calendar,
}

impl Store {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called inside a tokio runtime.
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>, calendar: Calendar) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut directory = Directory::default();
        let mut kitchen = KitchenLedger::default();
        let mut projector = ProjectorLedger::default();
        let mut config = ConfigTable::new();
        for event in &events {
            match event.channel() {
                Channel::Directory => apply_to_directory(&mut directory, event),
                Channel::Kitchen => apply_to_kitchen(&mut kitchen, event),
                Channel::Projector => apply_to_projector(&mut projector, event),
                Channel::Config => apply_to_config(&mut config, event),
            }
        }
        tracing::info!(
            "replayed {} events: {} residents, {} kitchen bookings, {} projector bookings",
            events.len(),
            directory.residents.len(),
            kitchen.len(),
            projector.len()
        );

        Ok(Self {
            directory: RwLock::new(directory),
            kitchen: RwLock::new(kitchen),
            projector: RwLock::new(projector),
            config: RwLock::new(config),
            wal_tx,
            notify,
            calendar,
        })
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    async fn send_wal(&self, cmd: WalCommand) -> Result<(), StoreError> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))
    }

    /// Write an event through the group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send_wal(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// WAL-append, apply to the locked table, notify subscribers.
    pub(super) async fn commit<T>(
        &self,
        table: &mut T,
        event: Event,
        apply: fn(&mut T, &Event),
    ) -> Result<(), StoreError> {
        self.wal_append(&event).await?;
        apply(table, &event);
        self.notify.send(&event);
        Ok(())
    }

    pub async fn wal_stats(&self) -> Result<WalStats, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send_wal(WalCommand::Stats { response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))
    }

    /// Rewrite the WAL with only the events that recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let directory = self.directory.read().await;
        let kitchen = self.kitchen.read().await;
        let projector = self.projector.read().await;
        let config = self.config.read().await;

        let mut residents: Vec<&Resident> = directory.residents.values().collect();
        residents.sort_by_key(|r| r.id);
        let mut events: Vec<Event> = residents
            .into_iter()
            .map(|r| Event::ResidentCreated { resident: r.clone() })
            .collect();
        events.extend(directory.admins.iter().map(|(id, at)| Event::AdminGranted {
            resident_id: *id,
            granted_at: *at,
        }));
        events.extend(
            directory
                .blocks
                .values()
                .map(|b| Event::ResidentBlocked { block: b.clone() }),
        );
        events.extend(
            kitchen
                .by_slot
                .values()
                .map(|b| Event::KitchenBooked { booking: b.clone() }),
        );
        events.extend(
            projector
                .bookings
                .iter()
                .map(|b| Event::ProjectorBooked { booking: b.clone() }),
        );
        events.extend(config.values().map(|e| Event::ConfigSet { entry: e.clone() }));

        // Locks stay held until the writer has swapped files, so no append
        // can land between the snapshot and the swap.
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.send_wal(WalCommand::Compact { events, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        tracing::info!("compacted WAL to {count} events");
        Ok(())
    }
}
