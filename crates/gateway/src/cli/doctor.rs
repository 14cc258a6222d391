use sa_domain::config::{Config, ConfigSeverity, FamilyConfig};

/// Run startup diagnostics and print a summary. Returns `Ok(true)` when
/// every check passes.
pub fn run(config: &Config, family: &FamilyConfig) -> bool {
    println!("halo doctor");
    println!("===========\n");

    let mut all_passed = true;

    check_config_validation(config, &mut all_passed);
    check_family_validation(family, &mut all_passed);
    check_workspace(config, &mut all_passed);
    check_retention(config);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    print_check(
        "Runtime config validation",
        error_count == 0,
        if issues.is_empty() {
            "no issues".into()
        } else {
            format!("{} issue(s) ({error_count} error(s))", issues.len())
        },
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_family_validation(family: &FamilyConfig, all_passed: &mut bool) {
    let issues = family.validate();
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    print_check(
        "Family config validation",
        error_count == 0,
        if issues.is_empty() {
            "no issues".into()
        } else {
            format!("{} issue(s) ({error_count} error(s))", issues.len())
        },
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    let path = &config.workspace.root;
    let exists = path.exists();
    let writable = if exists {
        let probe = path.join(".halo_doctor_probe");
        let w = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        w
    } else {
        false
    };

    let ok = exists && writable;
    let detail = match (exists, writable) {
        (true, true) => format!("{} (writable)", path.display()),
        (true, false) => format!("{} (not writable)", path.display()),
        _ => format!("{} (does not exist)", path.display()),
    };

    print_check("Workspace directory", ok, detail);
    if !ok {
        *all_passed = false;
    }
}

fn check_retention(config: &Config) {
    let usable = config.retention.is_usable();
    print_check(
        "File retention scheduler",
        usable,
        if usable {
            format!("enabled, interval={}ms", config.retention.interval_ms)
        } else {
            "disabled or misconfigured".into()
        },
    );
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
