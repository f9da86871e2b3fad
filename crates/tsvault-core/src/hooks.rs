use std::time::Duration;

use crate::config::HooksConfig;
use crate::error::{Result, TsvaultError};
use crate::platform::shell::{command_for_script, run_command_with_timeout};

/// Upper bound for a single hook command. Hooks are notifications, not work.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// Context passed to hook commands via environment variables and variable
/// substitution.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub command: String,
    pub database: String,
    pub host: String,
    pub tier: Option<String>,
    pub archive: Option<String>,
    pub error: Option<String>,
}

impl HookContext {
    pub fn new(command: &str, database: &str) -> Self {
        Self {
            command: command.to_string(),
            database: database.to_string(),
            host: crate::platform::hostname(),
            ..Default::default()
        }
    }
}

/// Run the hook lifecycle around an action:
///
/// 1. `before` then `before_<cmd>`
/// 2. The action itself
/// 3. On success: `after_<cmd>` then `after`.
///    On failure: `failed_<cmd>` then `failed`
/// 4. Always: `finally_<cmd>` then `finally`
///
/// The action receives the context so it can record the archive it produced.
/// An action that returns `Ok` but sets `ctx.error` (the monitor reporting a
/// degraded state) counts as failed for hook selection.
///
/// Hook failures are logged as warnings and never change the action's result.
pub fn run_with_hooks<T>(
    hooks: &HooksConfig,
    ctx: &mut HookContext,
    action: impl FnOnce(&mut HookContext) -> Result<T>,
) -> Result<T> {
    let cmd = ctx.command.clone();

    log_hook_errors(run_hook_list(hooks.get_hooks("before"), ctx));
    log_hook_errors(run_hook_list(hooks.get_hooks(&format!("before_{cmd}")), ctx));

    let result = action(ctx);

    if let Err(e) = &result {
        ctx.error = Some(e.to_string());
    }
    if ctx.error.is_none() {
        log_hook_errors(run_hook_list(hooks.get_hooks(&format!("after_{cmd}")), ctx));
        log_hook_errors(run_hook_list(hooks.get_hooks("after"), ctx));
    } else {
        log_hook_errors(run_hook_list(hooks.get_hooks(&format!("failed_{cmd}")), ctx));
        log_hook_errors(run_hook_list(hooks.get_hooks("failed"), ctx));
    }

    log_hook_errors(run_hook_list(hooks.get_hooks(&format!("finally_{cmd}")), ctx));
    log_hook_errors(run_hook_list(hooks.get_hooks("finally"), ctx));

    result
}

fn run_hook_list(cmds: &[String], ctx: &HookContext) -> Result<()> {
    for cmd in cmds {
        execute_hook_command(cmd, ctx)?;
    }
    Ok(())
}

fn execute_hook_command(cmd: &str, ctx: &HookContext) -> Result<()> {
    let expanded = substitute_variables(cmd, ctx);
    tracing::info!("Running hook: {expanded}");

    let mut child = command_for_script(&expanded);
    child.env("TSVAULT_COMMAND", &ctx.command);
    child.env("TSVAULT_DATABASE", &ctx.database);
    child.env("TSVAULT_HOST", &ctx.host);
    if let Some(ref tier) = ctx.tier {
        child.env("TSVAULT_TIER", tier);
    }
    if let Some(ref archive) = ctx.archive {
        child.env("TSVAULT_ARCHIVE", archive);
    }
    if let Some(ref error) = ctx.error {
        child.env("TSVAULT_ERROR", error);
    }

    let output = run_command_with_timeout(&mut child, HOOK_TIMEOUT)
        .map_err(|e| TsvaultError::Hook(format!("failed to execute '{expanded}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(TsvaultError::Hook(format!(
            "hook '{expanded}' exited with {code}: {}",
            stderr.trim()
        )));
    }

    Ok(())
}

fn substitute_variables(cmd: &str, ctx: &HookContext) -> String {
    let mut result = cmd.replace("{command}", &shell_escape(&ctx.command));
    result = result.replace("{database}", &shell_escape(&ctx.database));
    result = result.replace("{host}", &shell_escape(&ctx.host));
    result = result.replace("{tier}", &shell_escape(ctx.tier.as_deref().unwrap_or("")));
    result = result.replace(
        "{archive}",
        &shell_escape(ctx.archive.as_deref().unwrap_or("")),
    );
    result = result.replace("{error}", &shell_escape(ctx.error.as_deref().unwrap_or("")));
    result
}

fn shell_escape(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    let escaped = input.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

fn log_hook_errors(result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Hook warning: {e}");
    }
}
