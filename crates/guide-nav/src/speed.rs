//! Operator cruising-speed overrides.
//!
//! The vehicle flies at a configured default speed per airframe regime
//! unless the operator commands an override. Overrides are kept per
//! regime so a multirotor setting does not leak into fixed-wing flight
//! on a transitioning vehicle. A negative value means "no override".

use serde::Deserialize;

use guide_proto::FrameKind;

/// Default speeds used when no override is active.
#[derive(Debug, Clone, Deserialize)]
pub struct CruiseParams {
    /// Rotary-wing cruise speed in m/s.
    pub default_mc_mps: f32,
    /// Fixed-wing cruise speed in m/s.
    pub default_fw_mps: f32,
    /// Fixed-wing cruise throttle, 0..=1.
    pub default_throttle: f32,
}

impl Default for CruiseParams {
    fn default() -> Self {
        Self {
            default_mc_mps: 5.0,
            default_fw_mps: 15.0,
            default_throttle: 0.6,
        }
    }
}

const UNSET: f32 = -1.0;

/// Live and stored cruising-speed overrides for both airframe regimes.
///
/// `store`/`restore` exist for flight phases that must temporarily force
/// a speed (VTOL transitions): the live override is snapshotted before
/// the phase and put back afterwards, so an operator override survives
/// the excursion bit for bit.
#[derive(Debug, Clone)]
pub struct CruisingSpeeds {
    params: CruiseParams,
    speed_mc: f32,
    speed_fw: f32,
    stored_mc: f32,
    stored_fw: f32,
    throttle: f32,
}

impl CruisingSpeeds {
    pub fn new(params: CruiseParams) -> Self {
        Self {
            params,
            speed_mc: UNSET,
            speed_fw: UNSET,
            stored_mc: UNSET,
            stored_fw: UNSET,
            throttle: f32::NAN,
        }
    }

    /// Effective cruise speed for the given regime: the override when one
    /// is set, the configured default otherwise.
    pub fn get(&self, frame: FrameKind) -> f32 {
        let (live, default) = match frame {
            FrameKind::RotaryWing => (self.speed_mc, self.params.default_mc_mps),
            FrameKind::FixedWing => (self.speed_fw, self.params.default_fw_mps),
        };
        if live > 0.0 {
            live
        } else {
            default
        }
    }

    /// Sets the override for one regime. Zero, negative or non-finite
    /// values clear it.
    pub fn set(&mut self, frame: FrameKind, speed: f32) {
        let value = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            UNSET
        };
        match frame {
            FrameKind::RotaryWing => self.speed_mc = value,
            FrameKind::FixedWing => self.speed_fw = value,
        }
    }

    /// Clears both live overrides.
    pub fn reset(&mut self) {
        self.speed_mc = UNSET;
        self.speed_fw = UNSET;
    }

    /// Snapshots the live override for one regime into its stored slot.
    pub fn store(&mut self, frame: FrameKind) {
        match frame {
            FrameKind::RotaryWing => self.stored_mc = self.speed_mc,
            FrameKind::FixedWing => self.stored_fw = self.speed_fw,
        }
    }

    /// Copies stored overrides back to the live slots where a stored
    /// value exists. Slots without a snapshot are left alone.
    pub fn restore(&mut self) {
        if self.stored_mc > 0.0 {
            self.speed_mc = self.stored_mc;
        }
        if self.stored_fw > 0.0 {
            self.speed_fw = self.stored_fw;
        }
    }

    /// Drops both snapshots without touching the live overrides.
    pub fn reset_stored(&mut self) {
        self.stored_mc = UNSET;
        self.stored_fw = UNSET;
    }

    /// Effective cruise throttle: the override when set, the configured
    /// default otherwise.
    pub fn throttle(&self) -> f32 {
        if self.throttle.is_finite() && self.throttle > 0.0 {
            self.throttle
        } else {
            self.params.default_throttle
        }
    }

    /// Sets the throttle override, 0..=1. Non-finite or non-positive
    /// values clear it.
    pub fn set_throttle(&mut self, throttle: f32) {
        self.throttle = if throttle.is_finite() && throttle > 0.0 {
            throttle.min(1.0)
        } else {
            f32::NAN
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speeds() -> CruisingSpeeds {
        CruisingSpeeds::new(CruiseParams::default())
    }

    #[test]
    fn defaults_until_override_set() {
        let mut s = speeds();
        assert_eq!(s.get(FrameKind::RotaryWing), 5.0);
        assert_eq!(s.get(FrameKind::FixedWing), 15.0);

        s.set(FrameKind::RotaryWing, 3.5);
        assert_eq!(s.get(FrameKind::RotaryWing), 3.5);
        assert_eq!(s.get(FrameKind::FixedWing), 15.0);
    }

    #[test]
    fn negative_or_nan_clears_override() {
        let mut s = speeds();
        s.set(FrameKind::FixedWing, 22.0);
        s.set(FrameKind::FixedWing, -1.0);
        assert_eq!(s.get(FrameKind::FixedWing), 15.0);

        s.set(FrameKind::FixedWing, 22.0);
        s.set(FrameKind::FixedWing, f32::NAN);
        assert_eq!(s.get(FrameKind::FixedWing), 15.0);
    }

    #[test]
    fn store_restore_round_trips_override() {
        let mut s = speeds();
        s.set(FrameKind::RotaryWing, 5.0);
        s.store(FrameKind::RotaryWing);
        s.set(FrameKind::RotaryWing, 2.0);
        assert_eq!(s.get(FrameKind::RotaryWing), 2.0);

        s.restore();
        assert_eq!(s.get(FrameKind::RotaryWing), 5.0);
    }

    #[test]
    fn restore_without_snapshot_is_a_no_op() {
        let mut s = speeds();
        s.set(FrameKind::RotaryWing, 4.0);
        s.restore();
        assert_eq!(s.get(FrameKind::RotaryWing), 4.0);

        s.reset_stored();
        s.store(FrameKind::FixedWing);
        s.restore();
        assert_eq!(s.get(FrameKind::RotaryWing), 4.0);
    }

    #[test]
    fn reset_clears_both_regimes() {
        let mut s = speeds();
        s.set(FrameKind::RotaryWing, 3.0);
        s.set(FrameKind::FixedWing, 18.0);
        s.reset();
        assert_eq!(s.get(FrameKind::RotaryWing), 5.0);
        assert_eq!(s.get(FrameKind::FixedWing), 15.0);
    }

    #[test]
    fn throttle_override_clamped_and_clearable() {
        let mut s = speeds();
        assert_eq!(s.throttle(), 0.6);
        s.set_throttle(0.8);
        assert_eq!(s.throttle(), 0.8);
        s.set_throttle(1.4);
        assert_eq!(s.throttle(), 1.0);
        s.set_throttle(-1.0);
        assert_eq!(s.throttle(), 0.6);
    }
}
