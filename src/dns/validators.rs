use regex::Regex;
use std::sync::LazyLock;

static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("valid regex"));

static IPV6_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F:]+$").expect("valid regex"));

/// Four dot-separated groups of 1-3 digits. Octet values above 255 pass.
pub fn validate_dotted_quad(addr: &str) -> bool {
    DOTTED_QUAD.is_match(addr)
}

/// Hex digits and colons, the same token the zone parser accepts for AAAA.
pub fn validate_ipv6_token(addr: &str) -> bool {
    addr.contains(':') && IPV6_TOKEN.is_match(addr)
}

/// A single zone-file token: non-empty, no whitespace, nothing the
/// record grammar treats as a delimiter.
pub fn validate_owner_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    !name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ';' | '"' | '(' | ')'))
}

pub fn validate_txt_payload(text: &str) -> bool {
    !text.is_empty() && !text.contains('"') && !text.contains('\n')
}

pub fn validate_ptr_octet(octet: &str) -> bool {
    !octet.is_empty() && octet.len() <= 3 && octet.chars().all(|c| c.is_ascii_digit())
}

/// Zone names become file names and quoted registry strings.
pub fn validate_zone_name(zone: &str) -> bool {
    if zone.is_empty() || zone.len() > 253 {
        return false;
    }

    !zone
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '/' | '\\' | '{' | '}' | ';'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dotted_quad() {
        assert!(validate_dotted_quad("192.168.1.10"));
        assert!(validate_dotted_quad("300.1.1.1"));
        assert!(!validate_dotted_quad("192.168.1"));
        assert!(!validate_dotted_quad("192.168.1.1.1"));
        assert!(!validate_dotted_quad("a.b.c.d"));
    }

    #[test]
    fn test_validate_ipv6_token() {
        assert!(validate_ipv6_token("2001:db8::1"));
        assert!(validate_ipv6_token("::1"));
        assert!(!validate_ipv6_token("2001:db8::g"));
        assert!(!validate_ipv6_token("deadbeef"));
    }

    #[test]
    fn test_validate_owner_name() {
        assert!(validate_owner_name("@"));
        assert!(validate_owner_name("www"));
        assert!(validate_owner_name("mail.example.com."));
        assert!(validate_owner_name("_sip._tcp"));
        assert!(!validate_owner_name(""));
        assert!(!validate_owner_name("two words"));
        assert!(!validate_owner_name("x;y"));
    }

    #[test]
    fn test_validate_zone_name() {
        assert!(validate_zone_name("example.com"));
        assert!(validate_zone_name("1.168.192.in-addr.arpa"));
        assert!(!validate_zone_name(""));
        assert!(!validate_zone_name("example com"));
        assert!(!validate_zone_name("../etc"));
    }

    #[test]
    fn test_validate_ptr_octet() {
        assert!(validate_ptr_octet("10"));
        assert!(!validate_ptr_octet("1000"));
        assert!(!validate_ptr_octet("x1"));
    }
}
