use rc_domain::config::{Config, ConfigError, ConfigSeverity};

/// Counts of validation issues by severity.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
}

impl IssueCounts {
    pub fn of(issues: &[ConfigError]) -> Self {
        let errors = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .count();
        Self {
            errors,
            warnings: issues.len() - errors,
        }
    }
}

/// Validate the config and print one line per issue plus a summary.
///
/// Returns `false` when at least one error was found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!(
            "Config OK ({config_path}): pipeline={:?} storage={:?} lock_scope={:?}",
            config.pipeline.mode, config.storage.backend, config.sessions.lock_scope
        );
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    let counts = IssueCounts::of(&issues);
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        counts.errors, counts.warnings
    );
    counts.errors == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
