use sa_domain::config::{Config, ConfigSeverity, FamilyConfig};

/// Validate `config` and `family`, printing every issue. Returns `true` when
/// there are zero `Error`-severity issues in either document.
pub fn validate(config: &Config, family: &FamilyConfig) -> bool {
    let config_issues = config.validate();
    let family_issues = family.validate();

    if config_issues.is_empty() && family_issues.is_empty() {
        println!("Config OK");
        return true;
    }

    for issue in &config_issues {
        println!("config.json: {issue}");
    }
    for issue in &family_issues {
        println!("family config: {issue}");
    }

    let config_errors = config_issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    let family_errors = family_issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    let warnings = config_issues.len() + family_issues.len() - config_errors - family_errors;

    println!(
        "\n{} error(s), {} warning(s)",
        config_errors + family_errors,
        warnings
    );

    config_errors == 0 && family_errors == 0
}

/// Dump the resolved runtime config (with all defaults filled in) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
