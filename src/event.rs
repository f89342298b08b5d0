use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::cache::StatusUpdate;
use crate::dashboard::Outcome;
use crate::worker::WorkerEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Offline indicator / last-updated label changed
  Status(StatusUpdate),
  /// Notification from the offline worker
  Worker(WorkerEvent),
  /// An orchestration finished
  Dashboard(Outcome),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let key_tx = tx.clone();
    tokio::spawn(async move {
      loop {
        if event::poll(tick_rate).unwrap_or(false) {
          if let Ok(CrosstermEvent::Key(key)) = event::read() {
            if key_tx.send(Event::Key(key)).is_err() {
              break;
            }
          }
        } else if key_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks reporting back to the UI loop
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

/// Forward every status change into the event loop.
pub fn forward_status(mut status: watch::Receiver<StatusUpdate>, tx: mpsc::UnboundedSender<Event>) {
  tokio::spawn(async move {
    while status.changed().await.is_ok() {
      let update = status.borrow_and_update().clone();
      if tx.send(Event::Status(update)).is_err() {
        break;
      }
    }
  });
}

/// Forward worker notifications into the event loop.
pub fn forward_worker(
  mut events: mpsc::UnboundedReceiver<WorkerEvent>,
  tx: mpsc::UnboundedSender<Event>,
) {
  tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      if tx.send(Event::Worker(event)).is_err() {
        break;
      }
    }
  });
}
