/// Vibration pattern (on/off milliseconds) for `urgent` arrivals
pub const VIBRATE_URGENT: &[u32] = &[200, 100, 200, 100, 200];

/// Vibration pattern for every other notification type
pub const VIBRATE_DEFAULT: &[u32] = &[200];

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default interval between store polls, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Header carrying the authenticated account id
pub const HEADER_USER_ID: &str = "x-user-id";

/// Header carrying the authenticated account role
pub const HEADER_USER_ROLE: &str = "x-user-role";
