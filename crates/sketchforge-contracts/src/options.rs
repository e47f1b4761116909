use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::kebab_case;

/// First major release whose CLI scaffolds standalone projects by default.
pub const STANDALONE_DEFAULT_MAJOR: u32 = 17;

pub const DEFAULT_FRAMEWORK_VERSION: FrameworkVersion = FrameworkVersion {
    major: 17,
    minor: 3,
};

const DEFAULT_DISPLAY_NAME: &str = "Sketch App";

/// Options for the "full project from sketch" pipeline.
///
/// Field names follow the JSON the export endpoint receives; `routingEnabled`
/// and `stylingAddOn` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectOptions {
    pub name: String,
    /// Target framework version, e.g. `"17.3"` or `"^16.2.0"`.
    pub version: String,
    #[serde(alias = "routingEnabled")]
    pub include_routing: bool,
    #[serde(alias = "stylingAddOn")]
    pub css_framework: StylingAddOn,
    pub style_language: StyleLanguage,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_DISPLAY_NAME.to_string(),
            version: DEFAULT_FRAMEWORK_VERSION.to_string(),
            include_routing: true,
            css_framework: StylingAddOn::None,
            style_language: StyleLanguage::Scss,
        }
    }
}

impl ProjectOptions {
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            DEFAULT_DISPLAY_NAME
        } else {
            trimmed
        }
    }

    /// Package name and archive root directory.
    pub fn project_slug(&self) -> String {
        let slug = kebab_case(self.display_name());
        if slug.is_empty() {
            kebab_case(DEFAULT_DISPLAY_NAME)
        } else {
            slug
        }
    }

    pub fn framework_version(&self) -> FrameworkVersion {
        FrameworkVersion::parse(&self.version).unwrap_or(DEFAULT_FRAMEWORK_VERSION)
    }

    pub fn style_ext(&self) -> &'static str {
        self.style_language.extension()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StylingAddOn {
    #[default]
    #[serde(alias = "")]
    None,
    /// Utility CSS framework (Bootstrap).
    #[serde(alias = "utility-framework", alias = "utility")]
    Bootstrap,
    /// Component library (Angular Material).
    #[serde(alias = "component-library", alias = "angular-material")]
    Material,
}

impl StylingAddOn {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(Self::None),
            "bootstrap" | "utility" | "utility-framework" => Some(Self::Bootstrap),
            "material" | "component-library" | "angular-material" => Some(Self::Material),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleLanguage {
    Css,
    #[default]
    Scss,
}

impl StyleLanguage {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Scss => "scss",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "css" => Some(Self::Css),
            "scss" | "sass" => Some(Self::Scss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameworkVersion {
    pub major: u32,
    pub minor: u32,
}

impl FrameworkVersion {
    /// Accepts `17`, `17.3`, `17.3.1`, `^17.3.0`, `~16.2`, `v15`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw
            .trim()
            .trim_start_matches(['^', '~', '=', 'v', 'V', '>', '<'])
            .trim();
        let mut parts = trimmed.split('.');
        let major = parts.next()?.trim().parse::<u32>().ok()?;
        if major == 0 {
            return None;
        }
        let minor = parts
            .next()
            .and_then(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<u32>().ok()
            })
            .unwrap_or(0);
        Some(Self { major, minor })
    }

    pub fn defaults_to_standalone(self) -> bool {
        self.major >= STANDALONE_DEFAULT_MAJOR
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Serialized as `"major.minor"`.
impl Serialize for FrameworkVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
