//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Command name matching and literal parsing
//!
//! Operators may truncate command names down to a per-command minimum
//! length, in any letter case. Numeric operands are parsed strictly: any
//! malformed or out-of-range literal yields [`CommandError::InvalidArgument`]
//! naming the literal.

use crate::{CommandError, CommandResult};
use vmhost_service::{DeviceAddress, MAX_DEVICE_ADDRESS};

/// Largest storage location accepted by [`parse_hex_location`]
pub const MAX_HEX_LOCATION: u32 = 0xFF_FFFF;

/// Check `candidate` equals `full_name`, ignoring case
pub fn is_exact(candidate: &str, full_name: &str) -> bool {
    candidate.eq_ignore_ascii_case(full_name)
}

/// Check `candidate` is an acceptable abbreviation of `full_name`
///
/// The candidate must be a case-insensitive prefix of the full name, no
/// longer than it, and at least `min_len` characters long (or the whole
/// name when the name is shorter than `min_len`).
pub fn is_abbrev(candidate: &str, full_name: &str, min_len: usize) -> bool {
    let len = candidate.len();
    len >= min_len.min(full_name.len())
        && len <= full_name.len()
        && full_name.as_bytes()[..len].eq_ignore_ascii_case(candidate.as_bytes())
}

/// Parse a base-10 integer
pub fn parse_decimal(text: &str) -> CommandResult<i64> {
    text.parse::<i64>()
        .map_err(|_| CommandError::invalid_argument(text, "not a decimal number"))
}

/// Parse a 3-hex-digit device address (CUU)
pub fn parse_device_address(text: &str) -> CommandResult<DeviceAddress> {
    let value = parse_hex(text)?;
    u16::try_from(value)
        .ok()
        .and_then(DeviceAddress::new)
        .ok_or_else(|| {
            CommandError::invalid_argument(
                text,
                format!("device address exceeds {MAX_DEVICE_ADDRESS:03X}"),
            )
        })
}

/// Parse a hexadecimal storage location of at most 24 bits
pub fn parse_hex_location(text: &str) -> CommandResult<u32> {
    let value = parse_hex(text)?;
    if value > MAX_HEX_LOCATION {
        return Err(CommandError::invalid_argument(
            text,
            format!("location exceeds {MAX_HEX_LOCATION:06X}"),
        ));
    }
    Ok(value)
}

fn parse_hex(text: &str) -> CommandResult<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CommandError::invalid_argument(
            text,
            "not a hexadecimal number",
        ));
    }
    u32::from_str_radix(text, 16)
        .map_err(|_| CommandError::invalid_argument(text, "hexadecimal number too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(is_exact("shutdown", "SHUTDOWN"));
        assert!(is_exact("SHUTDOWN", "SHUTDOWN"));
        assert!(!is_exact("CPU", "CPUTYPE"));
        assert!(!is_exact("SHUTDOWNX", "SHUTDOWN"));
    }

    #[test]
    fn test_abbreviation_match() {
        assert!(is_abbrev("CPU", "CPUTYPE", 3));
        assert!(is_abbrev("cpuT", "CPUTYPE", 3));
        assert!(is_abbrev("CPUTYPE", "CPUTYPE", 3));
        assert!(!is_abbrev("CP", "CPUTYPE", 3));
        assert!(!is_abbrev("CPUTYPEX", "CPUTYPE", 3));
        assert!(!is_abbrev("CPX", "CPUTYPE", 3));
    }

    #[test]
    fn test_abbreviation_min_len_longer_than_name() {
        assert!(is_abbrev("HELP", "HELP", 10));
        assert!(!is_abbrev("HEL", "HELP", 10));
    }

    #[test]
    fn test_exact_is_abbrev_with_full_length() {
        for candidate in ["CPUTYPE", "CPU", "cputype", "CPUTYPES"] {
            assert_eq!(
                is_exact(candidate, "CPUTYPE"),
                is_abbrev(candidate, "CPUTYPE", "CPUTYPE".len())
            );
        }
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("42").unwrap(), 42);
        assert_eq!(parse_decimal("-7").unwrap(), -7);
        assert!(parse_decimal("4x2").unwrap_err().is_argument_error());
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn test_parse_device_address() {
        assert_eq!(parse_device_address("FFF").unwrap().as_u16(), 0xFFF);
        assert_eq!(parse_device_address("191").unwrap().as_u16(), 0x191);
        assert_eq!(parse_device_address("00e").unwrap().to_string(), "00E");

        let err = parse_device_address("1000").unwrap_err();
        assert!(err.to_string().contains("'1000'"));
        assert!(matches!(err, CommandError::InvalidArgument { .. }));

        let err = parse_device_address("ZZZ").unwrap_err();
        assert!(err.to_string().contains("'ZZZ'"));
        assert!(matches!(err, CommandError::InvalidArgument { .. }));
        assert!(parse_device_address("+1").is_err());
    }

    #[test]
    fn test_parse_hex_location() {
        assert_eq!(parse_hex_location("FFFFFF").unwrap(), 0xFF_FFFF);
        assert_eq!(parse_hex_location("0").unwrap(), 0);
        assert!(parse_hex_location("1000000").is_err());
        assert!(parse_hex_location("FFFFFFFFFF").is_err());
        assert!(parse_hex_location("G").is_err());
    }
}
