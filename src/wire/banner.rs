//! Banner line construction (spec.md §6).

/// Capability bits composing the banner's hex bitmap, in the order the
/// original directive table assigns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Class,
    Directive,
    Display,
    Forward,
    HoldConnect,
    Limit,
    Notify,
    Quit,
    Register,
    Schema,
    Security,
    Soa,
    Status,
    Xfer,
    Extended,
    Rwhois,
}

impl Capability {
    pub fn bit(self) -> u32 {
        use Capability::*;
        match self {
            Class => 0x000001,
            Directive => 0x000002,
            Display => 0x000004,
            Forward => 0x000008,
            HoldConnect => 0x000010,
            Limit => 0x000020,
            Notify => 0x000040,
            Quit => 0x000080,
            Register => 0x000100,
            Schema => 0x000200,
            Security => 0x000400,
            Soa => 0x000800,
            Status => 0x001000,
            Xfer => 0x002000,
            Extended => 0x004000,
            Rwhois => 0x008000,
        }
    }

    pub const ALL: [Capability; 16] = [
        Capability::Class,
        Capability::Directive,
        Capability::Display,
        Capability::Forward,
        Capability::HoldConnect,
        Capability::Limit,
        Capability::Notify,
        Capability::Quit,
        Capability::Register,
        Capability::Schema,
        Capability::Security,
        Capability::Soa,
        Capability::Status,
        Capability::Xfer,
        Capability::Extended,
        Capability::Rwhois,
    ];
}

/// Protocol version advertised in the banner line.
pub const PROTOCOL_VERSION: &str = "1.5";

/// Builds the `%rwhois V-<ver>:<cap-hex>:00 <host> (vendor)` banner line
/// from the set of enabled capability bits.
pub fn build(enabled: &[Capability], hostname: &str, vendor: &str) -> String {
    let bitmap: u32 = enabled.iter().fold(0, |acc, cap| acc | cap.bit());
    format!("%rwhois V-{PROTOCOL_VERSION}:{bitmap:06x}:00 {hostname} ({vendor})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_capabilities_produce_the_full_bitmap() {
        let line = build(&Capability::ALL, "rwhois.example", "rwhoisd-rs");
        assert_eq!(line, "%rwhois V-1.5:00ffff:00 rwhois.example (rwhoisd-rs)");
    }

    #[test]
    fn matches_the_banner_line_grammar() {
        let line = build(&[Capability::Class], "host", "vendor");
        let re_like = line.starts_with("%rwhois V-1.5:")
            && line.contains(':')
            && line.ends_with(')');
        assert!(re_like);
    }

    #[test]
    fn no_capabilities_yields_zero_bitmap() {
        let line = build(&[], "host", "vendor");
        assert_eq!(line, "%rwhois V-1.5:000000:00 host (vendor)");
    }
}
