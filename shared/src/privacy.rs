use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sensitivity tag attached to a route.
///
/// Ordered from least to most sensitive, so `level >= PrivacyLevel::Private`
/// reads as "at least private".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    Shared,
    Private,
    Confidential,
    Stealth,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Shared => "shared",
            PrivacyLevel::Private => "private",
            PrivacyLevel::Confidential => "confidential",
            PrivacyLevel::Stealth => "stealth",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "shared" => Ok(PrivacyLevel::Shared),
            "private" => Ok(PrivacyLevel::Private),
            "confidential" => Ok(PrivacyLevel::Confidential),
            "stealth" => Ok(PrivacyLevel::Stealth),
            other => Err(format!("unknown privacy level: {}", other)),
        }
    }
}

/// Area of the application a privacy setting applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyContext {
    General,
    CalendarEvents,
    Tasks,
    Wellness,
    Assistant,
    Analytics,
}

impl PrivacyContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyContext::General => "general",
            PrivacyContext::CalendarEvents => "calendar_events",
            PrivacyContext::Tasks => "tasks",
            PrivacyContext::Wellness => "wellness",
            PrivacyContext::Assistant => "assistant",
            PrivacyContext::Analytics => "analytics",
        }
    }
}

impl Default for PrivacyContext {
    fn default() -> Self {
        PrivacyContext::General
    }
}

impl fmt::Display for PrivacyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata declared on a route and read by the privacy guard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    #[serde(default)]
    pub privacy_level: Option<PrivacyLevel>,
    #[serde(default)]
    pub context: PrivacyContext,
    #[serde(default)]
    pub requires_encryption: bool,
    #[serde(default)]
    pub allow_off_grid: bool,
}

impl RouteData {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn protected(level: PrivacyLevel, context: PrivacyContext) -> Self {
        Self {
            privacy_level: Some(level),
            context,
            ..Self::default()
        }
    }

    pub fn with_encryption(mut self) -> Self {
        self.requires_encryption = true;
        self
    }

    pub fn with_off_grid(mut self) -> Self {
        self.allow_off_grid = true;
        self
    }

    /// True when the guard has nothing to check.
    pub fn is_unrestricted(&self) -> bool {
        self.privacy_level.is_none() && !self.requires_encryption
    }

    /// Stealth calendar routes additionally require camouflage mode.
    pub fn needs_camouflage(&self) -> bool {
        self.privacy_level == Some(PrivacyLevel::Stealth)
            && self.context == PrivacyContext::CalendarEvents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(PrivacyLevel::Stealth > PrivacyLevel::Confidential);
        assert!(PrivacyLevel::Public < PrivacyLevel::Shared);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("stealth".parse::<PrivacyLevel>(), Ok(PrivacyLevel::Stealth));
        assert!("secret".parse::<PrivacyLevel>().is_err());
    }

    #[test]
    fn test_route_data_camel_case() {
        let data: RouteData = serde_json::from_str(
            r#"{"privacyLevel": "stealth", "context": "calendar_events", "requiresEncryption": true}"#,
        )
        .unwrap();
        assert_eq!(data.privacy_level, Some(PrivacyLevel::Stealth));
        assert!(data.requires_encryption);
        assert!(!data.allow_off_grid);
        assert!(data.needs_camouflage());
    }

    #[test]
    fn test_unrestricted() {
        assert!(RouteData::open().is_unrestricted());
        assert!(!RouteData::open().with_encryption().is_unrestricted());
        assert!(!RouteData::protected(PrivacyLevel::Public, PrivacyContext::General).is_unrestricted());
    }
}
