//! User roles and capability checks.
//!
//! Checks are plain functions over a set of roles, called explicitly at each
//! boundary that needs one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  Manager,
  User,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
  AdminOrgData,
  MakePayments,
  InviteGrantees,
  ViewAssessments,
  UploadAssessment,
  SubmitAssessment,
}

impl Role {
  pub fn grants(self, permission: Permission) -> bool {
    use Permission::*;
    match self {
      Role::Admin => true,
      Role::Manager => matches!(
        permission,
        InviteGrantees | ViewAssessments | UploadAssessment | SubmitAssessment
      ),
      Role::User => matches!(permission, SubmitAssessment),
    }
  }
}

/// `true` if the user holds at least one of the `required` roles.
pub fn has_role(user_roles: &HashSet<Role>, required: &HashSet<Role>) -> bool {
  !user_roles.is_disjoint(required)
}

/// `true` if any of the user's roles grants `permission`.
pub fn has_permission(user_roles: &HashSet<Role>, permission: Permission) -> bool {
  user_roles.iter().any(|role| role.grants(permission))
}
