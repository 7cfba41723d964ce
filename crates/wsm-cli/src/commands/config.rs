use std::fmt::Write as _;

use wsm_config::{PollWindow, WsmConfig};
use wsm_flight::{Backoff, RetryPolicy};

/// The effective configuration, laid out like `wsm.toml`.
pub(crate) fn render(config: &WsmConfig) -> String {
    let mut out = String::new();
    for policy in [
        config.retry().cloud(),
        config.retry().long_sync(),
        config.retry().short_database(),
    ] {
        retry_section(&mut out, &policy);
    }

    out.push_str("[polling]\n");
    let polling = config.polling();
    for (name, window) in [
        ("dataproc_create", polling.dataproc_create()),
        ("dataproc_delete", polling.dataproc_delete()),
        ("namespace_delete", polling.namespace_delete()),
    ] {
        poll_line(&mut out, name, window);
    }

    let deletion = config.bucket_deletion();
    let _ = writeln!(
        out,
        "\n[bucket_deletion]\ninterval_secs = {}\nmax_attempts = {}",
        deletion.interval().as_secs(),
        deletion.max_attempts()
    );

    out.push_str("\n[flight_store]\n");
    match config.flight_store().directory() {
        Some(directory) => {
            let _ = writeln!(out, "directory = {:?}", directory.display().to_string());
        }
        None => out.push_str("# directory not set\n"),
    }
    out
}

fn retry_section(out: &mut String, policy: &RetryPolicy) {
    let _ = writeln!(out, "[retry.{}]", policy.name());
    match policy.backoff() {
        Backoff::Fixed { interval } => {
            let _ = writeln!(
                out,
                "strategy = \"fixed\"\ninitial_interval_secs = {0}\nmax_interval_secs = {0}",
                interval.as_secs()
            );
        }
        Backoff::Exponential { initial, max } => {
            let _ = writeln!(
                out,
                "strategy = \"exponential\"\ninitial_interval_secs = {}\nmax_interval_secs = {}",
                initial.as_secs(),
                max.as_secs()
            );
        }
    }
    let _ = writeln!(out, "max_retries = {}\n", policy.max_retries());
}

fn poll_line(out: &mut String, name: &str, window: PollWindow) {
    let _ = writeln!(
        out,
        "{name} = {{ interval_secs = {}, timeout_secs = {} }}",
        window.interval().as_secs(),
        window.timeout().as_secs()
    );
}
