//! Server and tool version parsing.

use crate::error::CatalogError;
use std::fmt;

/// A PostgreSQL major/minor version pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerVersion {
    /// Major version (14, 15, 16, ...)
    pub major: u32,
    /// Minor version; 0 when the source string carries none
    pub minor: u32,
}

impl ServerVersion {
    /// Parse a `server_version` style string: `16.4`, `16.4 (Debian
    /// 16.4-1.pgdg120+1)`, `17beta1`.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let token = raw
            .trim()
            .split_whitespace()
            .next()
            .ok_or_else(|| CatalogError::VersionParse(raw.to_string()))?;

        let mut parts = token.split('.');
        let major = leading_number(parts.next().unwrap_or_default())
            .ok_or_else(|| CatalogError::VersionParse(raw.to_string()))?;
        let minor = parts.next().and_then(leading_number).unwrap_or(0);

        Ok(ServerVersion { major, minor })
    }

    /// Parse the output of `<tool> --version`, e.g.
    /// `pg_dump (PostgreSQL) 16.4`. The version is the last token.
    pub fn parse_tool_output(raw: &str) -> Result<Self, CatalogError> {
        let token = raw
            .trim()
            .split_whitespace()
            .last()
            .ok_or_else(|| CatalogError::VersionParse(raw.to_string()))?;
        ServerVersion::parse(token)
    }

    /// Major-version compatibility check used by the driver.
    pub fn same_major(&self, other: &ServerVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn leading_number(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
