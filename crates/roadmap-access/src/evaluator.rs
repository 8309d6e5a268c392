//! Access-policy evaluation
//!
//! Resolution order, first match wins:
//!
//! 1. anonymous callers get `View` if the `Public` group may view, else `None`
//! 2. administrators get `Admin`
//! 3. the author, listed editors and members of an edit group get `Edit`
//! 4. listed viewers and members of a view group get `View`
//! 5. everyone else gets `None`
//!
//! Every edit-granting rule runs before any view-granting rule, so an editor
//! who is absent from the viewer lists is never downgraded.

use crate::acl::AccessControlled;
use crate::level::AccessLevel;
use crate::principal::Principal;

/// Group name that opens a resource to anonymous callers
pub const PUBLIC_GROUP: &str = "Public";

/// Principal's level was below the operation's minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("access denied: requires {required}, resolved {resolved}")]
pub struct AccessDenied {
    /// Minimum the operation needed
    pub required: AccessLevel,
    /// Level the principal resolved to
    pub resolved: AccessLevel,
}

/// Resolve the access level of `principal` (`None` = anonymous) on `acl`
///
/// Pure and total.
#[must_use]
pub fn evaluate(acl: &AccessControlled, principal: Option<&Principal>) -> AccessLevel {
    let Some(principal) = principal else {
        return if acl.grants_view_to_group(PUBLIC_GROUP) {
            AccessLevel::View
        } else {
            AccessLevel::None
        };
    };

    if principal.is_admin {
        return AccessLevel::Admin;
    }

    if acl.is_author(principal.id)
        || acl.lists_editor(principal.id)
        || acl.edit_groups.iter().any(|g| principal.in_group(&g.name))
    {
        return AccessLevel::Edit;
    }

    if acl.lists_viewer(principal.id)
        || acl.view_groups.iter().any(|g| principal.in_group(&g.name))
    {
        return AccessLevel::View;
    }

    AccessLevel::None
}

/// Evaluate and require at least `required`
///
/// # Errors
/// [`AccessDenied`] when the resolved level ranks below `required`.
pub fn authorize(
    acl: &AccessControlled,
    principal: Option<&Principal>,
    required: AccessLevel,
) -> Result<AccessLevel, AccessDenied> {
    let resolved = evaluate(acl, principal);
    if resolved.satisfies(required) {
        Ok(resolved)
    } else {
        Err(AccessDenied { required, resolved })
    }
}
