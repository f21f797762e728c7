//! Tracking of long-running operator actions.
//!
//! An action is started with an id and a timeout, runs until an external
//! acknowledgement arrives, and is abandoned with a warning when the
//! timeout elapses first. Only one action can be in flight at a time.

use time::OffsetDateTime;
use tracing::warn;

use guide_proto::Notices;

const IDLE: i8 = -1;

/// One in-flight action plus its timeout bookkeeping.
///
/// `id` is non-negative while an action is active and `-1` when idle.
#[derive(Debug, Clone)]
pub struct CustomActionTracker {
    id: i8,
    timeout_s: f32,
    timer_started: bool,
    start_time: Option<OffsetDateTime>,
    last_ack_time: Option<OffsetDateTime>,
}

impl Default for CustomActionTracker {
    fn default() -> Self {
        Self {
            id: IDLE,
            timeout_s: 0.0,
            timer_started: false,
            start_time: None,
            last_ack_time: None,
        }
    }
}

impl CustomActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.id >= 0
    }

    /// Id of the in-flight action, if any.
    pub fn active_id(&self) -> Option<i8> {
        self.is_active().then_some(self.id)
    }

    /// Starts an action. Returns false and reports a warning when another
    /// action is still in flight; the running action is not disturbed.
    ///
    /// A timeout of zero or less means the action never times out and must
    /// be acknowledged or reset explicitly.
    pub fn start(
        &mut self,
        id: i8,
        timeout_s: f32,
        now: OffsetDateTime,
        notices: &mut Notices,
    ) -> bool {
        if id < 0 {
            notices.warning(format!("custom action: invalid id {id}"));
            return false;
        }
        if self.is_active() {
            warn!(active = self.id, rejected = id, "custom action already in flight");
            notices.warning(format!(
                "custom action {id} rejected, action {} still in flight",
                self.id
            ));
            return false;
        }
        self.id = id;
        self.timeout_s = timeout_s;
        self.timer_started = timeout_s > 0.0;
        self.start_time = self.timer_started.then_some(now);
        true
    }

    /// Completes the in-flight action. Acknowledgements for a different id
    /// or with nothing in flight are reported and ignored.
    pub fn acknowledge(&mut self, id: i8, now: OffsetDateTime, notices: &mut Notices) {
        if !self.is_active() {
            notices.warning(format!("custom action: stray ack for {id}"));
            return;
        }
        if id != self.id {
            notices.warning(format!(
                "custom action: ack for {id} does not match active action {}",
                self.id
            ));
            return;
        }
        self.last_ack_time = Some(now);
        self.clear();
    }

    /// Per-cycle timeout check. When the timeout elapses the action is
    /// dropped and a warning is reported once; once idle, further calls do
    /// nothing.
    pub fn update(&mut self, now: OffsetDateTime, notices: &mut Notices) {
        if !self.is_active() || !self.timer_started {
            return;
        }
        let Some(start) = self.start_time else {
            return;
        };
        let elapsed = (now - start).as_seconds_f32();
        if elapsed > self.timeout_s {
            warn!(id = self.id, elapsed, "custom action timed out");
            notices.warning(format!("custom action {} timed out", self.id));
            self.clear();
        }
    }

    /// Drops the in-flight action without an acknowledgement.
    pub fn reset(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.id = IDLE;
        self.timeout_s = 0.0;
        self.timer_started = false;
        self.start_time = None;
    }
}
