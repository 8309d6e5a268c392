//! Ranked access levels
//!
//! Levels are compared by rank only. A caller asking "may this principal
//! edit?" writes `level >= AccessLevel::Edit`, never an equality test.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of policy evaluation, also used as a required minimum.
///
/// Ordered `None < View < Edit < Admin`; the derived `Ord` follows the
/// declaration order and the explicit discriminants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum AccessLevel {
    /// No access at all
    #[default]
    None = 0,
    /// Read-only access
    View = 1,
    /// May change content
    Edit = 2,
    /// Administrator override
    Admin = 3,
}

impl AccessLevel {
    /// All levels in ascending rank
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::None,
        AccessLevel::View,
        AccessLevel::Edit,
        AccessLevel::Admin,
    ];

    /// Numeric rank
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// True if this level meets `required`
    #[inline]
    #[must_use]
    pub fn satisfies(self, required: AccessLevel) -> bool {
        self >= required
    }

    /// Shorthand for `satisfies(View)`
    #[inline]
    #[must_use]
    pub fn can_view(self) -> bool {
        self.satisfies(AccessLevel::View)
    }

    /// Shorthand for `satisfies(Edit)`
    #[inline]
    #[must_use]
    pub fn can_edit(self) -> bool {
        self.satisfies(AccessLevel::Edit)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::None => write!(f, "NONE"),
            AccessLevel::View => write!(f, "VIEW"),
            AccessLevel::Edit => write!(f, "EDIT"),
            AccessLevel::Admin => write!(f, "ADMIN"),
        }
    }
}
