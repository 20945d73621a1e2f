//! Standard exit codes (BSD sysexits.h compatible)

/// Invalid request arguments
pub const USAGE: i32 = 64;

/// Data integrity error in collaborator data
pub const DATAERR: i32 = 65;

/// Collaborator unavailable or failing
pub const UNAVAILABLE: i32 = 69;

/// Internal software error
pub const SOFTWARE: i32 = 70;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;
