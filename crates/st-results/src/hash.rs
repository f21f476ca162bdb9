//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};

/// Hash of the network text and the settings that shape a simulation.
///
/// `settings` pairs are hashed in the given order, so callers should pass
/// them in a fixed order.
pub fn compute_run_id(network_text: &str, settings: &[(&str, String)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(network_text.as_bytes());
    for (key, value) in settings {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        let settings = [("pollutant", "TSS".to_string())];
        assert_eq!(
            compute_run_id("[JUNCTIONS]\nJ1 10\n", &settings),
            compute_run_id("[JUNCTIONS]\nJ1 10\n", &settings)
        );
        assert_eq!(compute_run_id("", &[]).len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = compute_run_id("net", &[("start_date", "01/01/2019".to_string())]);
        let b = compute_run_id("net", &[("start_date", "01/02/2019".to_string())]);
        let c = compute_run_id("net2", &[("start_date", "01/01/2019".to_string())]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
