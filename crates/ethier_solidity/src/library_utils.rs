//! Utility functions for working with unlinked library placeholders.
//!
//! When a contract calls an external library function, the compiler leaves a
//! 40 hex character placeholder of the form `__$<34 hex characters>$__` where
//! the library's address is to be filled in at deployment. The placeholder
//! always is the immediate of a `PUSH20`.

use std::{borrow::Cow, sync::LazyLock};

use alloy_primitives::{Address, hex};
use regex::Regex;

/// Length of a library placeholder (and of a hex-encoded address).
pub const PLACEHOLDER_HEX_LEN: usize = 40;

const ZERO_ADDRESS: &str = "0000000000000000000000000000000000000000";

static LIBRARY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__\$[0-9a-fA-F]{34}\$__").expect("library placeholder regex is valid")
});

/// Strips an optional `0x` prefix from a hex string.
pub fn strip_hex_prefix(code: &str) -> &str {
    code.strip_prefix("0x").unwrap_or(code)
}

/// Whether the hex-encoded bytecode contains unlinked library placeholders.
pub fn has_library_placeholders(code: &str) -> bool {
    LIBRARY_PLACEHOLDER.is_match(code)
}

/// Replaces every library placeholder with the zero address. As placeholders
/// are always pushed, this leaves the instruction layout intact.
pub fn zero_library_placeholders(code: &str) -> Cow<'_, str> {
    LIBRARY_PLACEHOLDER.replace_all(strip_hex_prefix(code), ZERO_ADDRESS)
}

/// Links the library address into every placeholder of the hex-encoded
/// bytecode.
pub fn link_library_placeholders(code: &str, library: &Address) -> String {
    let address = hex::encode(library);

    LIBRARY_PLACEHOLDER
        .replace_all(strip_hex_prefix(code), address.as_str())
        .into_owned()
}

/// Decodes hex-encoded bytecode, treating library placeholders as the zero
/// address.
pub fn decode_bytecode(code: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(zero_library_placeholders(code).as_bytes())
}

/// Builds a pattern that matches the hex encoding of the bytecode with any
/// address linked into its library placeholders.
pub fn wildcard_pattern(code: &str) -> Result<Regex, regex::Error> {
    let literals = LIBRARY_PLACEHOLDER
        .split(strip_hex_prefix(code))
        .map(regex::escape)
        .collect::<Vec<_>>();

    let wildcard = format!("[0-9a-fA-F]{{{PLACEHOLDER_HEX_LEN}}}");
    Regex::new(&format!("(?i)^{}$", literals.join(wildcard.as_str())))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    const PLACEHOLDER: &str = "__$fb8ad2a10bc7a103b279269d40e57be834$__";

    fn unlinked() -> String {
        format!("0x6080604052{PLACEHOLDER}5af400")
    }

    #[test]
    fn detects_placeholders() {
        assert!(has_library_placeholders(&unlinked()));
        assert!(!has_library_placeholders("0x6080604052"));
    }

    #[test]
    fn zeroes_placeholders() -> anyhow::Result<()> {
        let code = decode_bytecode(&unlinked())?;

        assert_eq!(code.len(), 5 + 20 + 2);
        assert!(code[5..25].iter().all(|byte| *byte == 0));
        assert_eq!(code[25..], [0x5a, 0xf4]);

        Ok(())
    }

    #[test]
    fn pattern_matches_linked_bytecode() -> anyhow::Result<()> {
        let pattern = wildcard_pattern(&unlinked())?;
        let library = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

        let linked = link_library_placeholders(&unlinked(), &library);
        assert_eq!(
            linked,
            "60806040525fbdb2315678afecb367f032d93f642f64180aa35af400"
        );
        assert!(pattern.is_match(&linked));
        assert!(pattern.is_match(&linked.to_uppercase()));

        // Trailing data is not part of the compiled bytecode
        assert!(!pattern.is_match(&format!("{linked}00")));
        // Neither is a different body
        assert!(!pattern.is_match(&linked.replace("6080", "6081")));

        Ok(())
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(decode_bytecode("0x60zz").is_err());
    }
}
