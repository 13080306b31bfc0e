use crate::matcher::Target;
use serde::Deserialize;
use std::fmt;

/// One injection, as written in a request file.
///
/// ```toml
/// file = "AppDelegate.m"
/// selector = "application:didFinishLaunchingWithOptions:"
/// class = "AppDelegate"
/// code = "[self setup];\n\t"
/// args = ["-c", "-arch", "i386"]
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Read the injection text from this file instead of `code`.
    #[serde(default)]
    pub code_file: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub definitions_only: bool,
    #[serde(default)]
    pub strict: bool,
}

impl RequestConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.file.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "file" });
        }

        if self.selector.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "selector" });
        } else if let Err(e) = self.target() {
            issues.push(ValidationIssue::InvalidSelector {
                message: e.to_string(),
            });
        }

        if let Some(class) = &self.class {
            if class.trim().is_empty() {
                issues.push(ValidationIssue::MissingField { field: "class" });
            }
        }

        match (&self.code, &self.code_file) {
            (None, None) => issues.push(ValidationIssue::MissingField { field: "code" }),
            (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                message: "code and code_file cannot both be set".to_string(),
            }),
            (None, Some(path)) if path.trim().is_empty() => {
                issues.push(ValidationIssue::MissingField { field: "code_file" })
            }
            _ => {}
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// The selector, scoped by `class` when one is given.
    ///
    /// An explicit `class` overrides one embedded in a `-[Class sel]` selector.
    pub fn target(&self) -> Result<Target, crate::matcher::TargetError> {
        let target = Target::parse(&self.selector)?;
        Ok(match &self.class {
            Some(class) if !class.trim().is_empty() => {
                Target::new(target.selector()).with_class(class.trim())
            }
            _ => target,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    InvalidSelector { message: String },
    InvalidCombo { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "request missing required field '{field}'")
            }
            ValidationIssue::InvalidSelector { message } => {
                write!(f, "request has invalid selector: {message}")
            }
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid request configuration: {message}")
            }
        }
    }
}
