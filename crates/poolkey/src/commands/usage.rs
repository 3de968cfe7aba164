//! Usage command handler.

use chrono::Utc;
use poolkey_core::UsageRecord;

use crate::cli::UsageArgs;
use crate::error::CliError;
use crate::output;

use super::{Context, util};

fn detail(u: &UsageRecord, color: bool) -> String {
    let remaining = u
        .remaining_bytes()
        .map_or_else(|| "unlimited".into(), util::human_bytes);
    let expired = u.expiry.is_past(Utc::now());
    let exhausted = u.remaining_bytes() == Some(0);
    let state = match (u.enabled, expired, exhausted) {
        (false, _, _) => output::paint_state("disabled", false, color),
        (true, true, _) => output::paint_state("expired", false, color),
        (true, false, true) => output::paint_state("quota exhausted", false, color),
        (true, false, false) => output::paint_state("active", true, color),
    };
    [
        format!("Label:     {}", u.label),
        format!("Client ID: {}", u.client_id),
        format!("Server:    {} ({})", u.backend_name, u.backend),
        format!("Inbound:   {}", u.inbound_id),
        format!("Upload:    {}", util::human_bytes(u.up_bytes)),
        format!("Download:  {}", util::human_bytes(u.down_bytes)),
        format!("Used:      {}", util::human_bytes(u.used_bytes())),
        format!("Quota:     {}", util::human_quota(u.quota_bytes)),
        format!("Remaining: {remaining}"),
        format!("Expires:   {}", u.expiry),
        format!("Status:    {state}"),
    ]
    .join("\n")
}

/// Remaining bytes, or `unlimited`.
fn plain(u: &UsageRecord) -> String {
    u.remaining_bytes()
        .map_or_else(|| "unlimited".into(), |b| b.to_string())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: UsageArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let controller = util::build_controller(ctx.global, &ctx.config)?;
    let cancel = util::interrupt_token();

    let record = controller
        .lookup(&args.client_id, &cancel)
        .await?
        .ok_or_else(|| CliError::CredentialNotFound {
            id: args.client_id.clone(),
        })?;

    let out = output::render_single(
        ctx.ui.format,
        &record,
        |u| detail(u, ctx.ui.color),
        plain,
    )?;
    output::print_output(&out, ctx.ui.quiet);
    Ok(())
}
