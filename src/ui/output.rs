//! Line-oriented console output used while agents run.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::icons::{AGENT, CROSS, INFO, RECOVER, SAVE, WARN};
use crate::runtime::Channel;
use crate::tandem_config::{AgentOutputMode, OutputSettings};
use crate::util::shorten;

pub fn print_info(msg: &str) {
    println!("{}{}", INFO, msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{}{}", WARN, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{}{}", CROSS, style(msg).red().bold());
}

pub fn print_checkpoint(path: &Path) {
    println!("{}saved {}", SAVE, style(path.display()).dim());
}

pub fn print_recovery(msg: &str) {
    println!("{}{}", RECOVER, msg);
}

/// Spinner shown while a captured agent call is running.
pub fn agent_spinner(agent: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} {elapsed:.dim}")
            .expect("progress bar template is a valid static string"),
    );
    spinner.set_message(format!("waiting for {}", style(agent).cyan()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Echo one live-streamed child line.
pub fn print_live_line(agent: &str, channel: Channel, line: &str) {
    let prefix = format!("[{}:{}]", agent, channel.as_str());
    let prefix = match channel {
        Channel::Stdout => style(prefix).cyan(),
        Channel::Stderr => style(prefix).magenta(),
    };
    println!("{} {}", prefix, line.trim_end());
}

/// Show an accepted or rejected agent response according to the output mode.
pub fn print_agent_output(
    settings: &OutputSettings,
    agent: &str,
    log_path: &Path,
    attempt: u32,
    output: &str,
) {
    if settings.agent_output == AgentOutputMode::None {
        return;
    }
    println!(
        "{}{} attempt={} log={}",
        AGENT,
        style(agent).cyan().bold(),
        attempt,
        style(log_path.display()).dim()
    );
    if settings.live_stream {
        println!(
            "{}",
            style("live stream was enabled; final response saved to log.").dim()
        );
        return;
    }
    match settings.agent_output {
        AgentOutputMode::Full => println!("{}", output.trim()),
        _ => println!("{}", shorten(output, settings.summary_limit())),
    }
}

pub fn print_fallback(agent: &str, fallback: &str, attempt: u32, log_path: &Path) {
    println!(
        "{}{} fallback for {} attempt={} log={}",
        AGENT,
        style(fallback).cyan().bold(),
        agent,
        attempt,
        style(log_path.display()).dim()
    );
}
