//! # Permission Provisioning
//!
//! When a caller asks for a new permission while creating a menu or binding
//! one, the engine delegates to a [`PermissionProvisioner`]. The returned
//! key is stored on the menu.

use crate::primitives::PERMISSION_KEY_PREFIX;
use crate::{MenuError, MenuNode};

/// Collaborator that creates a permission for a menu and returns its key.
pub trait PermissionProvisioner: Send + Sync {
    /// Create (or look up) the permission for `menu`.
    ///
    /// `name` is the human-readable permission name supplied by the caller.
    fn provision(&self, menu: &MenuNode, name: Option<&str>) -> Result<String, MenuError>;
}

/// Derives `menu:<code>` without calling any permission service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedPermissions;

impl PermissionProvisioner for DerivedPermissions {
    fn provision(&self, menu: &MenuNode, _name: Option<&str>) -> Result<String, MenuError> {
        Ok(format!("{PERMISSION_KEY_PREFIX}{}", menu.code))
    }
}
