/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! System attribute parsing functions

use super::common::{clean_value, parse_key_value};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OS_VERSION_RE: Regex = Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?").unwrap();
}

/// Prefix used by service accounts (`_mbsetupuser`, `_windowserver`, ...)
const SERVICE_ACCOUNT_PREFIX: char = '_';

/// Parse a single `sw_vers -<key>` value; empty output means not present
pub fn parse_sw_vers_value(output: &str) -> Option<String> {
    let value = clean_value(output);
    (!value.is_empty()).then_some(value)
}

/// Parse a macOS product version such as `13.4` or `10.15.7`
///
/// Missing minor/patch components are taken as zero.
pub fn parse_os_version(version: &str) -> Option<semver::Version> {
    let caps = OS_VERSION_RE.captures(version.trim())?;
    let component = |idx: usize| -> Option<u64> {
        caps.get(idx)
            .map_or(Some(0), |m| m.as_str().parse::<u64>().ok())
    };

    Some(semver::Version::new(component(1)?, component(2)?, component(3)?))
}

/// Parse `sysctl -in hw.optional.arm64`; the key is absent on Intel Macs
pub fn parse_arm64_flag(output: &str) -> bool {
    output.trim().parse::<i64>().map(|v| v == 1).unwrap_or(false)
}

/// Parse the console user from `scutil` `show State:/Users/ConsoleUser`
///
/// Service accounts (names starting with `_`) do not count as a logged in user.
pub fn parse_console_user(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("Name "))
        .filter_map(|line| parse_key_value(line, ':').ok())
        .find(|(key, _)| key == "Name")
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty() && !name.starts_with(SERVICE_ACCOUNT_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_version() {
        assert_eq!(parse_os_version("13.4"), Some(semver::Version::new(13, 4, 0)));
        assert_eq!(parse_os_version("10.15.7\n"), Some(semver::Version::new(10, 15, 7)));
        assert_eq!(parse_os_version("14"), Some(semver::Version::new(14, 0, 0)));
        assert_eq!(parse_os_version("macOS"), None);
        assert!(parse_os_version("13.4.1").unwrap() > parse_os_version("13.4").unwrap());
    }

    #[test]
    fn test_parse_sw_vers_value() {
        assert_eq!(parse_sw_vers_value("22F66\n"), Some("22F66".to_string()));
        assert_eq!(parse_sw_vers_value("  \n"), None);
    }

    #[test]
    fn test_parse_arm64_flag() {
        assert!(parse_arm64_flag("1\n"));
        assert!(!parse_arm64_flag("0"));
        assert!(!parse_arm64_flag(""));
    }

    #[test]
    fn test_parse_console_user() {
        let output = "<dictionary> {
  GID : 20
  Name : alice
  UID : 501
}";
        assert_eq!(parse_console_user(output), Some("alice".to_string()));
    }

    #[test]
    fn test_parse_console_user_service_account() {
        let output = "<dictionary> {\n  Name : _mbsetupuser\n  UID : 248\n}";
        assert_eq!(parse_console_user(output), None);
        assert_eq!(parse_console_user("  No such key\n"), None);
    }
}
