//! Startup checks: agent executables on PATH and DNS for their hosts.

use tracing::{debug, warn};

use crate::tandem_config::AgentRegistry;
use crate::ui;

/// Whether `host` resolves to at least one address.
async fn resolves(host: &str) -> bool {
    match tokio::net::lookup_host((host, 443)).await {
        Ok(mut addrs) => addrs.next().is_some(),
        Err(err) => {
            debug!(host, error = %err, "DNS lookup failed");
            false
        }
    }
}

/// Check every agent in `required_agents`.
///
/// A missing executable or an unknown agent always fails the check. DNS
/// failures are reported and fail the check only when `strict`.
pub async fn check(registry: &AgentRegistry, required_agents: &[String], strict: bool) -> bool {
    ui::print_info("Preflight: checking CLI binaries and DNS resolution.");

    let mut ok = true;
    let mut dns_failures: Vec<String> = Vec::new();

    for agent in required_agents {
        let Some(definition) = registry.get(agent) else {
            ui::print_error(&format!("Unknown agent '{agent}' is not defined."));
            ok = false;
            continue;
        };

        match definition.executable() {
            Some(executable) => {
                if let Err(err) = which::which(executable) {
                    debug!(agent = %agent, executable, error = %err, "executable not found");
                    ui::print_error(&format!(
                        "Missing CLI binary for {agent}: {executable} (not found in PATH)."
                    ));
                    ok = false;
                }
            }
            None => {
                ui::print_error(&format!("Agent '{agent}' has an empty command."));
                ok = false;
            }
        }

        for host in &definition.required_hosts {
            if !resolves(host).await {
                dns_failures.push(format!("{agent}: {host}"));
            }
        }
    }

    if !dns_failures.is_empty() {
        warn!(failures = ?dns_failures, "DNS resolution failed");
        ui::print_warning("DNS resolution failed for:");
        for failure in &dns_failures {
            ui::print_warning(&format!("  - {failure}"));
        }
        ui::print_warning("Agent calls may fail in this environment.");
        if strict {
            ok = false;
        }
    }

    ui::print_info(&format!(
        "Preflight result: {}",
        if ok { "OK" } else { "FAILED" }
    ));
    ok
}
