//! Kubernetes resource quantity parsing.
//!
//! Node capacities arrive as quantity strings (`"500m"`, `"8"`, `"16Gi"`);
//! the engine works in integer millicores and bytes.

use crate::error::{ClusterError, ClusterResult};

/// Parse a CPU quantity to millicores: `"500m"` → 500, `"2"` → 2000.
pub fn cpu_millicores(quantity: &str) -> ClusterResult<u64> {
    if let Some(millis) = quantity.strip_suffix('m') {
        return millis
            .parse()
            .map_err(|_| ClusterError::InvalidQuantity(quantity.to_string()));
    }
    quantity
        .parse::<f64>()
        .map(|cores| (cores * 1000.0) as u64)
        .map_err(|_| ClusterError::InvalidQuantity(quantity.to_string()))
}

/// Parse a memory quantity to bytes: `"1Gi"` → 1073741824, `"500M"` →
/// 500000000. Binary suffixes Ki..Ei and decimal k/M are accepted; a bare
/// number is already bytes.
pub fn memory_bytes(quantity: &str) -> ClusterResult<u64> {
    const UNITS: [(&str, u64); 8] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("Pi", 1 << 50),
        ("Ei", 1 << 60),
        ("k", 1_000),
        ("M", 1_000_000),
    ];
    for (suffix, multiplier) in UNITS {
        if let Some(value) = quantity.strip_suffix(suffix) {
            return value
                .parse::<f64>()
                .map(|v| (v * multiplier as f64) as u64)
                .map_err(|_| ClusterError::InvalidQuantity(quantity.to_string()));
        }
    }
    quantity
        .parse()
        .map_err(|_| ClusterError::InvalidQuantity(quantity.to_string()))
}
