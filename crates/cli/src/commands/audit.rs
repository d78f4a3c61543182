use super::{CliError, Context};

pub(crate) async fn cmd_history(
    ctx: &Context,
    manager: Option<&str>,
    limit: usize,
) -> Result<(), CliError> {
    let events = ctx.registry.history(manager, limit).await?;
    ctx.answer(&events, || {
        if events.is_empty() {
            return "no events".to_string();
        }
        events
            .iter()
            .map(|e| {
                let subject = e
                    .manager
                    .as_deref()
                    .or(e.owner.as_deref())
                    .unwrap_or("-");
                format!(
                    "#{:<4} at={:<10} {:<21} {} by {}",
                    e.sequence,
                    e.at,
                    e.kind.as_str(),
                    subject,
                    e.caller
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

/// Recompute the audit hash chain; a broken chain is reported as error 107.
pub(crate) async fn cmd_audit(ctx: &Context) -> Result<(), CliError> {
    let checked = ctx.registry.verify_audit_chain().await?;
    let body = serde_json::json!({ "valid": true, "events": checked });
    ctx.answer(&body, || format!("Audit chain OK ({} events)", checked));
    Ok(())
}
