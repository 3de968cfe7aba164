//! Provision command handler.

use poolkey_config::Plan;
use poolkey_core::{ProvisionRequest, ProvisionResult};

use crate::cli::ProvisionArgs;
use crate::error::CliError;
use crate::output;

use super::{Context, util};

/// Plan from the config with the per-call overrides applied.
fn build_request(ctx: &Context<'_>, args: &ProvisionArgs) -> Result<ProvisionRequest, CliError> {
    let base = ctx.config.plan(&args.plan)?;
    let plan = Plan {
        quota_gb: args.quota_gb.unwrap_or(base.quota_gb),
        days: args.days.unwrap_or(base.days),
    };
    Ok(plan.request(&args.label))
}

fn detail(r: &ProvisionResult, color: bool) -> String {
    let c = &r.credential;
    let state = if r.existed {
        output::paint_dim("existing", color)
    } else {
        output::paint_state("new", true, color)
    };
    [
        format!("Label:     {}", c.label),
        format!("Client ID: {}", c.id),
        format!("Server:    {}", r.backend),
        format!("Quota:     {}", util::human_quota(c.quota_bytes)),
        format!("Expires:   {}", c.expiry),
        format!("Issued:    {state}"),
        String::new(),
        r.uri.clone(),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ProvisionArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let request = build_request(ctx, &args)?;
    let controller = util::build_controller(ctx.global, &ctx.config)?;
    let cancel = util::interrupt_token();

    let result = if args.pinned || args.server.is_some() {
        controller
            .provision_on(args.server.as_deref(), &request, &cancel)
            .await?
    } else {
        controller
            .provision(args.region.as_deref(), &request, &cancel)
            .await?
    };

    if result.existed {
        ctx.ui.note(&format!(
            "Label '{}' already exists on {}; returning the existing credential",
            result.credential.label, result.backend
        ));
    }

    let out = output::render_single(
        ctx.ui.format,
        &result,
        |r| detail(r, ctx.ui.color),
        |r| r.uri.clone(),
    )?;
    output::print_output(&out, ctx.ui.quiet);
    Ok(())
}
