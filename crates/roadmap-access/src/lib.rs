//! Roadmap Access - policy layer
//!
//! Maps a resource's access-control list and a principal to a ranked
//! [`AccessLevel`]:
//! - [`Principal`] and [`Group`] describe the caller
//! - [`AccessControlled`] is the one ACL shape every loader produces
//! - [`evaluate`] and [`authorize`] resolve and gate access
//!
//! # Example
//!
//! ```rust
//! use roadmap_access::{evaluate, AccessControlled, AccessLevel, Principal, PrincipalId};
//!
//! let owner = Principal::new(PrincipalId::new(), "owner");
//! let member = Principal::new(PrincipalId::new(), "member").with_groups(["ClimateTeam"]);
//! let acl = AccessControlled::owned_by(owner.to_ref()).with_edit_groups(["ClimateTeam"]);
//!
//! assert_eq!(evaluate(&acl, Some(&member)), AccessLevel::Edit);
//! assert_eq!(evaluate(&acl, None), AccessLevel::None);
//! ```

#![warn(unreachable_pub)]

pub mod acl;
pub mod evaluator;
pub mod level;
pub mod principal;

pub use acl::AccessControlled;
pub use evaluator::{authorize, evaluate, AccessDenied, PUBLIC_GROUP};
pub use level::AccessLevel;
pub use principal::{Group, Principal, PrincipalId, PrincipalRef};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
