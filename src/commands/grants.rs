use serde::Serialize;

use crate::commands::App;
use crate::error::{HorizonError, Result};
use crate::model::{AccessLevel, PermissionGrant, ResourceType};
use crate::output::{self, Format};

fn ensure_resource_exists(app: &App, resource_type: ResourceType, resource_id: i64) -> Result<()> {
    match resource_type {
        ResourceType::Task => app.store.get_task(resource_id).map(|_| ()),
        ResourceType::Project => app.store.get_project(resource_id).map(|_| ()),
    }
}

pub fn grant(
    app: &App,
    resource_type: ResourceType,
    resource_id: i64,
    grantee_id: i64,
    access_level: AccessLevel,
    grantor_id: i64,
    format: Format,
) -> Result<()> {
    ensure_resource_exists(app, resource_type, resource_id)?;
    if grantee_id == grantor_id {
        return Err(HorizonError::InvalidInput(
            "grantor and grantee must differ".into(),
        ));
    }
    let grant = PermissionGrant {
        resource_type,
        resource_id,
        grantee_id,
        access_level,
        grantor_id,
    };
    app.store.grant(&grant)?;
    tracing::info!(%resource_type, resource_id, grantee_id, %access_level, "granted access");
    output::print_value(&grant, format)
}

#[derive(Debug, Serialize)]
struct RevokeOutput {
    resource_type: ResourceType,
    resource_id: i64,
    grantee_id: i64,
    revoked: bool,
}

pub fn revoke(
    app: &App,
    resource_type: ResourceType,
    resource_id: i64,
    grantee_id: i64,
    format: Format,
) -> Result<()> {
    let revoked = app.store.revoke(resource_type, resource_id, grantee_id)?;
    output::print_value(
        &RevokeOutput {
            resource_type,
            resource_id,
            grantee_id,
            revoked,
        },
        format,
    )
}

/// Grants held by `grantee_id`.
pub fn list(app: &App, grantee_id: i64, format: Format) -> Result<()> {
    let grants = app.store.grants_for(grantee_id)?;
    output::print_value(&grants, format)
}
