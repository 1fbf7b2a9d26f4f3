pub mod cors;
pub mod verify_internal;
