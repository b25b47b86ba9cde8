//! Universal constants for tally.

/// Reserved all-zero address standing in for each chain's native asset.
pub const NATIVE_SENTINEL: &str = "0x0000000000000000000000000000000000000000";

/// Canonical identifier the native-asset sentinel resolves to.
pub const NATIVE_ID: &str = "ethereum";

/// Decimals assumed for the native asset.
pub const NATIVE_DECIMALS: u32 = 18;

/// Multicall3: same deployment address on every supported chain.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";
