/// Longest `namespace-name` string used as a UID without hashing.
pub const MAX_VERBATIM_UID_LEN: usize = 40;

const FNV128_OFFSET: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV128_PRIME: u128 = 0x0000000001000000000000000000013b;

/// Stable dashboard UID for `(namespace, name)`.
///
/// `namespace-name` is returned verbatim when it fits in 40 bytes. Longer
/// inputs become the hex 128-bit FNV-1a digest of that string. The output is
/// a persistent key in the backend and must never change for the same input.
pub fn derive_identity(namespace: &str, name: &str) -> String {
    let uid = format!("{}-{}", namespace, name);
    if uid.len() <= MAX_VERBATIM_UID_LEN {
        return uid;
    }
    let mut h = FNV128_OFFSET;
    for b in uid.as_bytes() {
        h ^= *b as u128;
        h = h.wrapping_mul(FNV128_PRIME);
    }
    format!("{:032x}", h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_identity_is_verbatim() {
        assert_eq!(derive_identity("open-cluster-management", "test"), "open-cluster-management-test");
        assert_eq!(derive_identity("", ""), "-");
    }

    #[test]
    fn long_identity_is_hashed() {
        let uid = derive_identity("open-cluster-management-observability", "test");
        assert_eq!(uid, "4e20548bdba37201faabf30d1c419981");
        assert_eq!(uid.len(), 32);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn boundary_at_forty_bytes() {
        // "a"*n + "-" + "b" has n + 2 bytes
        let at = |total: usize| derive_identity(&"a".repeat(total - 2), "b");
        assert_eq!(at(39), format!("{}-b", "a".repeat(37)));
        assert_eq!(at(40), format!("{}-b", "a".repeat(38)));
        let hashed = at(41);
        assert_eq!(hashed.len(), 32);
        assert_ne!(hashed, format!("{}-b", "a".repeat(39)));
    }

    #[test]
    fn deterministic_across_calls() {
        for (ns, name) in [("x", "y"), ("open-cluster-management-observability", "grafana-dashboard-k8s")] {
            assert_eq!(derive_identity(ns, name), derive_identity(ns, name));
        }
        assert_ne!(derive_identity("a", "b"), derive_identity("b", "a"));
    }
}
