pub mod delivery;
pub mod duplicate_guard;
pub mod renderer;
pub mod schedule_gate;
