//! Environment check: `tandem preflight`.

use anyhow::Result;
use std::path::Path;

use tandem::tandem_config::TandemToml;

/// Agents a run needs: both roles, plus their fallbacks when fallback is enabled.
pub fn required_agents(toml: &TandemToml, with_fallback: bool) -> Vec<String> {
    let registry = toml.registry();
    let mut agents = vec![toml.roles.planner.clone(), toml.roles.reviewer.clone()];
    if with_fallback {
        let fallbacks: Vec<String> = agents
            .iter()
            .filter_map(|key| registry.get(key).and_then(|agent| agent.fallback.clone()))
            .collect();
        agents.extend(fallbacks);
    }
    let mut seen = std::collections::HashSet::new();
    agents.retain(|key| seen.insert(key.clone()));
    agents
}

pub async fn cmd_preflight(project_dir: &Path, strict: bool, with_fallback: bool) -> Result<()> {
    use tandem::config::Config;
    use tandem::runtime::preflight;

    let config = Config::new(project_dir.to_path_buf(), false)?;
    let strict = strict || config.toml.defaults.strict_preflight;
    let with_fallback = with_fallback || config.toml.defaults.allow_fallback;
    let agents = required_agents(&config.toml, with_fallback);

    if !preflight::check(&config.registry(), &agents, strict).await {
        anyhow::bail!("Preflight failed for: {}", agents.join(", "));
    }
    Ok(())
}
