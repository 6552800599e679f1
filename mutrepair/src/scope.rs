// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

/// Per-type bounds handed to the verifier, written `Type:N,Other:M`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    bounds: Vec<(String, u32)>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.bounds.iter().map(|(t, n)| (t.as_str(), *n))
    }

    pub fn bound_for(&self, type_name: &str) -> Option<u32> {
        self.iter().find(|(t, _)| *t == type_name).map(|(_, n)| n)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bounds: Vec<(String, u32)> = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (type_name, bound) = entry
                .split_once(':')
                .ok_or_else(|| format!("scope entry '{}' is not of the form Type:N", entry))?;
            let type_name = type_name.trim();
            if type_name.is_empty() {
                return Err(format!("scope entry '{}' has no type name", entry));
            }
            let bound: u32 = bound
                .trim()
                .parse()
                .map_err(|e| format!("scope entry '{}': {}", entry, e))?;
            if bound == 0 {
                return Err(format!("scope entry '{}': bound must be at least 1", entry));
            }
            if bounds.iter().any(|(t, _)| t == type_name) {
                return Err(format!("scope repeats type '{}'", type_name));
            }
            bounds.push((type_name.to_string(), bound));
        }
        Ok(Scope { bounds })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (t, n)) in self.bounds.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", t, n)?;
        }
        Ok(())
    }
}
