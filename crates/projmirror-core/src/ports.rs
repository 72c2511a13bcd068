//! Validated holder of a project's four port values.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortField {
    App,
    Internal,
    Debug,
    InternalDebug,
}

impl PortField {
    pub const ALL: [Self; 4] = [Self::App, Self::Internal, Self::Debug, Self::InternalDebug];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "appPort",
            Self::Internal => "internalPort",
            Self::Debug => "debugPort",
            Self::InternalDebug => "internalDebugPort",
        }
    }
}

impl fmt::Display for PortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port values as they arrive on the wire.
///
/// Each value is kept as text: an empty string means "unset", anything
/// else must parse to a port number. JSON numbers are accepted as their
/// decimal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortUpdate {
    #[serde(default, alias = "exposedPort", deserialize_with = "port_text")]
    pub app_port: Option<String>,
    #[serde(default, deserialize_with = "port_text")]
    pub internal_port: Option<String>,
    #[serde(default, alias = "exposedDebugPort", deserialize_with = "port_text")]
    pub debug_port: Option<String>,
    #[serde(default, deserialize_with = "port_text")]
    pub internal_debug_port: Option<String>,
}

impl PortUpdate {
    pub fn get(&self, field: PortField) -> Option<&str> {
        match field {
            PortField::App => self.app_port.as_deref(),
            PortField::Internal => self.internal_port.as_deref(),
            PortField::Debug => self.debug_port.as_deref(),
            PortField::InternalDebug => self.internal_debug_port.as_deref(),
        }
    }

    /// Check every present value without applying anything.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = PortField::ALL
            .into_iter()
            .filter_map(|field| match self.get(field) {
                Some(raw) if !raw.is_empty() => parse_port(field, raw).err(),
                _ => None,
            })
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Whether `field` carries a non-empty value.
    pub fn has(&self, field: PortField) -> bool {
        self.get(field).is_some_and(|raw| !raw.is_empty())
    }
}

fn port_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn parse_port(field: PortField, raw: &str) -> Result<u16, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::PortNotNumeric {
            field,
            value: raw.to_owned(),
        })?;
    if value <= 0 || value >= 65536 {
        return Err(ValidationError::PortOutOfRange { field, value });
    }
    Ok(value as u16)
}

/// Result of [`PortSet::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortApply {
    pub changed: Vec<PortField>,
    pub rejected: Vec<ValidationError>,
}

/// Four independent optional ports, each in (0, 65536).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSet {
    pub app_port: Option<u16>,
    pub internal_port: Option<u16>,
    pub debug_port: Option<u16>,
    pub internal_debug_port: Option<u16>,
}

impl PortSet {
    pub fn get(&self, field: PortField) -> Option<u16> {
        match field {
            PortField::App => self.app_port,
            PortField::Internal => self.internal_port,
            PortField::Debug => self.debug_port,
            PortField::InternalDebug => self.internal_debug_port,
        }
    }

    fn slot(&mut self, field: PortField) -> &mut Option<u16> {
        match field {
            PortField::App => &mut self.app_port,
            PortField::Internal => &mut self.internal_port,
            PortField::Debug => &mut self.debug_port,
            PortField::InternalDebug => &mut self.internal_debug_port,
        }
    }

    /// Apply each present field of `update` independently.
    ///
    /// Rejected values leave the prior value in place and are returned in
    /// `rejected`; they never count as a change.
    pub fn apply(&mut self, update: &PortUpdate) -> PortApply {
        let mut result = PortApply::default();
        for field in PortField::ALL {
            let Some(raw) = update.get(field) else {
                continue;
            };
            let next = if raw.is_empty() {
                None
            } else {
                match parse_port(field, raw) {
                    Ok(port) => Some(port),
                    Err(e) => {
                        tracing::warn!(field = %field, value = %raw, "rejected port update: {e}");
                        result.rejected.push(e);
                        continue;
                    }
                }
            };
            let slot = self.slot(field);
            if *slot != next {
                *slot = next;
                result.changed.push(field);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(raw: &str) -> PortUpdate {
        PortUpdate {
            app_port: Some(raw.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_port_is_stored() {
        let mut ports = PortSet::default();
        let result = ports.apply(&app("8080"));
        assert_eq!(ports.app_port, Some(8080));
        assert_eq!(result.changed, vec![PortField::App]);
    }

    #[test]
    fn out_of_range_and_garbage_are_rejected() {
        let mut ports = PortSet::default();
        ports.apply(&app("8080"));
        for bad in ["0", "65536", "abc", "-1"] {
            let result = ports.apply(&app(bad));
            assert!(result.changed.is_empty(), "{bad} should not change");
            assert_eq!(result.rejected.len(), 1, "{bad} should be rejected");
            assert_eq!(ports.app_port, Some(8080));
        }
    }

    #[test]
    fn rejection_keeps_unset_value_unset() {
        let mut ports = PortSet::default();
        ports.apply(&app("99999"));
        assert_eq!(ports.app_port, None);
    }

    #[test]
    fn same_value_is_not_a_change() {
        let mut ports = PortSet::default();
        ports.apply(&app("8080"));
        let result = ports.apply(&app(" 8080"));
        assert!(result.changed.is_empty());
    }

    #[test]
    fn empty_string_clears() {
        let mut ports = PortSet::default();
        // Clearing an unset port is not a change.
        assert!(ports.apply(&app("")).changed.is_empty());
        ports.apply(&app("8080"));
        let result = ports.apply(&app(""));
        assert_eq!(result.changed, vec![PortField::App]);
        assert_eq!(ports.app_port, None);
    }

    #[test]
    fn fields_are_independent() {
        let mut ports = PortSet::default();
        let result = ports.apply(&PortUpdate {
            app_port: Some("9080".into()),
            internal_port: Some("nope".into()),
            debug_port: Some("7777".into()),
            internal_debug_port: None,
        });
        assert_eq!(result.changed, vec![PortField::App, PortField::Debug]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(ports.internal_port, None);
    }

    #[test]
    fn wire_accepts_strings_numbers_and_aliases() {
        let update: PortUpdate = serde_json::from_str(
            r#"{"exposedPort": "32768", "internalPort": 9080, "exposedDebugPort": null}"#,
        )
        .unwrap();
        assert_eq!(update.app_port.as_deref(), Some("32768"));
        assert_eq!(update.internal_port.as_deref(), Some("9080"));
        assert_eq!(update.debug_port, None);
    }

    #[test]
    fn validate_reports_every_bad_field() {
        let update = PortUpdate {
            app_port: Some("0".into()),
            debug_port: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().len(), 2);
        assert!(app("8080").validate().is_ok());
    }
}
