//! Owner-only mutations: verify, revoke, transfer-owner.

use super::{CliError, Context};

pub(crate) async fn cmd_verify(
    ctx: &Context,
    caller: &str,
    manager: &str,
    name: &str,
    organization: &str,
    level: u32,
) -> Result<(), CliError> {
    let outcome = ctx
        .registry
        .verify(caller, manager, name, organization, level)
        .await?;
    ctx.emit(&outcome, || {
        format!(
            "Verified {}: {} ({}), level {} at {}",
            outcome.manager,
            outcome.details.name,
            outcome.details.organization,
            outcome.details.certification_level,
            outcome.details.verified_at
        )
    });
    Ok(())
}

pub(crate) async fn cmd_revoke(ctx: &Context, caller: &str, manager: &str) -> Result<(), CliError> {
    let outcome = ctx.registry.revoke(caller, manager).await?;
    ctx.emit(&outcome, || format!("Revoked {}", manager));
    Ok(())
}

pub(crate) async fn cmd_transfer_owner(
    ctx: &Context,
    caller: &str,
    new_owner: &str,
) -> Result<(), CliError> {
    let outcome = ctx.registry.transfer_ownership(caller, new_owner).await?;
    ctx.emit(&outcome, || {
        format!(
            "Ownership transferred: {} -> {}",
            outcome.previous_owner, outcome.owner
        )
    });
    Ok(())
}
