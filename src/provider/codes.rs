//! Provider message codes the downloader reacts to

/// Historical data service error (pacing violation, no data, invalid step)
pub const HISTORICAL_DATA_ERROR: i32 = 162;

/// No security definition found for the contract
pub const NO_SECURITY_DEFINITION: i32 = 200;

/// Request failed validation (e.g. earlier than available history)
pub const ERROR_VALIDATING_REQUEST: i32 = 321;

/// Client id already in use by another session
pub const CLIENT_ID_IN_USE: i32 = 326;

/// Connectivity between the gateway and the provider lost
pub const CONNECTION_LOST: i32 = 1100;

/// Market data farm connection is OK
pub const MARKET_DATA_CONNECTION_OK: i32 = 2104;
