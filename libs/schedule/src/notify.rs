//! Fan-out of change notices to subscribers.

use cadence_events::{ChangeKind, ChangeNotice, ChangeScope, Origin};
use cadence_id::Seq;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Numbers and broadcasts change notices.
///
/// Publishing never blocks and never fails: with no subscribers the notice is
/// dropped, and a slow subscriber sees `Lagged` on its next receive.
#[derive(Debug)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeNotice>,
    last_seq: Seq,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            last_seq: Seq::ZERO,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.sender.subscribe()
    }

    /// Sequence number of the most recent notice.
    pub fn last_seq(&self) -> Seq {
        self.last_seq
    }

    /// Publish a coordinator-wide notice.
    pub fn publish(&mut self, kind: ChangeKind, origin: Origin) -> Option<ChangeNotice> {
        self.emit(ChangeNotice::builder().kind(kind).origin(origin))
    }

    /// Publish a notice about one record.
    pub fn publish_about(
        &mut self,
        kind: ChangeKind,
        scope: ChangeScope,
        subject: impl ToString,
        origin: Origin,
    ) -> Option<ChangeNotice> {
        self.emit(
            ChangeNotice::builder()
                .kind(kind)
                .subject(scope, subject)
                .origin(origin),
        )
    }

    fn emit(&mut self, builder: cadence_events::ChangeNoticeBuilder) -> Option<ChangeNotice> {
        let seq = self.last_seq.next();
        let notice = match builder.seq(seq).build() {
            Ok(notice) => notice,
            Err(err) => {
                warn!(error = %err, "Dropping malformed change notice");
                return None;
            }
        };
        self.last_seq = seq;
        trace!(notice = %notice, "Publishing change notice");
        // No receivers is not an error here.
        let _ = self.sender.send(notice.clone());
        Some(notice)
    }
}
