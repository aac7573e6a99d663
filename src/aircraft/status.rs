use strum_macros::Display;

/// Observable activity of an aircraft, driven only by the head of its task
/// queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AircraftStatus {
    Idle,
    Travelling,
    Inspecting,
    Suppressing,
    Refuelling,
    RefillingWater,
    Hovering,
}
