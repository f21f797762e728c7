//! Autonomous navigation core: flight mode dispatch, setpoint triplet
//! publication and the safety monitors that sit beside it.
//!
//! The crate is driven from the outside. The caller feeds one
//! [`VehicleSample`](guide_proto::VehicleSample) per cycle into
//! [`Navigator::step`] and reads back the setpoint triplet, mode
//! transitions and any operator notices. Commands arriving between
//! cycles go through [`Navigator::handle_command`].

pub mod custom_action;
pub mod doctor;
pub mod geofence;
pub mod modes;
pub mod navigator;
pub mod replay;
pub mod speed;
pub mod traffic;

pub use custom_action::CustomActionTracker;
pub use geofence::{FenceCheck, GeofenceDefinition, GeofenceMonitor, GeofenceParams};
pub use modes::{
    LandApproach, MissionItem, MissionPlan, ModeKind, NavParams, RtlParams, VtolParams,
};
pub use navigator::{NavCommand, Navigator, NavigatorConfig, NavigatorOutput};
pub use replay::{ReplayEvent, SampleSource};
pub use speed::{CruiseParams, CruisingSpeeds};
pub use traffic::{TrafficAction, TrafficConflict, TrafficMonitor, TrafficParams};
