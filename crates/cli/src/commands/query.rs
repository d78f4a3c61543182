//! Read-only commands: status, details, list.

use sustain_registry::{RecordFilter, VerificationRecord};

use super::{CliError, Context};

pub(crate) async fn cmd_status(ctx: &Context, manager: &str) -> Result<(), CliError> {
    let verified = ctx.registry.is_verified(manager).await?;
    let body = serde_json::json!({ "manager": manager, "verified": verified });
    ctx.answer(&body, || {
        if verified {
            format!("{}: verified", manager)
        } else {
            format!("{}: not verified", manager)
        }
    });
    Ok(())
}

/// Prints the stored record, revoked or not. A manager that was never
/// verified is not an error: json mode prints `null`.
pub(crate) async fn cmd_details(ctx: &Context, manager: &str) -> Result<(), CliError> {
    let record = ctx.registry.get_details(manager).await?;
    ctx.answer(&record, || match &record {
        Some(r) => format_record(r),
        None => format!("{}: no verification record", manager),
    });
    Ok(())
}

pub(crate) async fn cmd_list(
    ctx: &Context,
    active: bool,
    revoked: bool,
    limit: usize,
) -> Result<(), CliError> {
    let filter = match (active, revoked) {
        (true, _) => RecordFilter::Active,
        (_, true) => RecordFilter::Revoked,
        _ => RecordFilter::All,
    };
    let records = ctx.registry.list_managers(filter, limit).await?;
    ctx.answer(&records, || {
        if records.is_empty() {
            return "no managers".to_string();
        }
        records
            .iter()
            .map(|r| {
                format!(
                    "{}  L{}  {:<7}  {} ({})",
                    r.manager,
                    r.certification_level,
                    if r.is_active() { "active" } else { "revoked" },
                    r.name,
                    r.organization
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

fn format_record(r: &VerificationRecord) -> String {
    let status = match r.revoked_at {
        Some(at) => format!("revoked at {}", at),
        None => "active".to_string(),
    };
    let level = r.certification_level.to_string();
    let verified_at = r.verified_at.to_string();
    [
        ("manager:", r.manager.as_str()),
        ("name:", r.name.as_str()),
        ("organization:", r.organization.as_str()),
        ("certification level:", level.as_str()),
        ("verified at:", verified_at.as_str()),
        ("status:", status.as_str()),
    ]
    .iter()
    .map(|(label, value)| format!("{:<21}{}", label, value))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_values_share_one_column() {
        let record = VerificationRecord {
            manager: "ST1MGR".to_string(),
            name: "Green Fund".to_string(),
            organization: "EcoCapital".to_string(),
            certification_level: 4,
            verified_at: 2,
            revoked: true,
            revoked_at: Some(3),
        };
        let text = format_record(&record);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        for line in &lines {
            let label_end = line.find(':').unwrap() + 1;
            let value_start = label_end + line[label_end..].find(|c| c != ' ').unwrap();
            assert_eq!(value_start, 21, "misaligned: {:?}", line);
        }
        assert_eq!(lines[3], "certification level: 4");
        assert_eq!(lines[5], "status:              revoked at 3");
    }
}
