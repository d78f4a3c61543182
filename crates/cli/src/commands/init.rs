use super::{CliError, Context};

pub(crate) async fn cmd_init(ctx: &Context, owner: &str) -> Result<(), CliError> {
    let meta = ctx.registry.initialize(owner).await?;
    ctx.emit(&meta, || {
        format!(
            "Registry initialized at '{}' (owner: {})",
            ctx.registry.storage().path().display(),
            meta.owner
        )
    });
    Ok(())
}
