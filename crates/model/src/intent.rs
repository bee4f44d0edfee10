use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The purpose of a user query.
///
/// This is a closed set. A failed classification is not `Unknown`, it is
/// the absence of an [`IntentClassification`](crate::IntentClassification).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Intent {
    /// A problem with the product that needs troubleshooting.
    #[serde(rename = "Technical Support", alias = "TECHNICAL_SUPPORT")]
    TechnicalSupport,
    /// A suggestion for a new capability.
    #[serde(
        rename = "Product Feature Request",
        alias = "PRODUCT_FEATURE_REQUEST"
    )]
    ProductFeatureRequest,
    /// Interest in buying.
    #[serde(rename = "Sales Lead", alias = "SALES_LEAD")]
    SalesLead,
    /// None of the above.
    #[serde(rename = "Unknown", alias = "UNKNOWN")]
    Unknown,
}

impl Intent {
    /// All intents, in declaration order.
    pub const ALL: [Intent; 4] = [
        Intent::TechnicalSupport,
        Intent::ProductFeatureRequest,
        Intent::SalesLead,
        Intent::Unknown,
    ];

    /// Returns the human readable label, e.g. `"Technical Support"`.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Intent::TechnicalSupport => "Technical Support",
            Intent::ProductFeatureRequest => "Product Feature Request",
            Intent::SalesLead => "Sales Lead",
            Intent::Unknown => "Unknown",
        }
    }

    #[inline]
    fn constant_name(self) -> &'static str {
        match self {
            Intent::TechnicalSupport => "TECHNICAL_SUPPORT",
            Intent::ProductFeatureRequest => "PRODUCT_FEATURE_REQUEST",
            Intent::SalesLead => "SALES_LEAD",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no [`Intent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseIntentError(String);

impl Display for ParseIntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized intent: {:?}", self.0)
    }
}

impl Error for ParseIntentError {}

impl FromStr for Intent {
    type Err = ParseIntentError;

    /// Accepts either the label or the constant name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Intent::ALL
            .into_iter()
            .find(|intent| {
                intent.label().eq_ignore_ascii_case(s)
                    || intent.constant_name().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| ParseIntentError(s.to_owned()))
    }
}
