//! `colonylab doctor`: Diagnose configuration and credentials.

use colonylab_config::Settings;
use colonylab_prompts::{COLONY_ANALYZER, COLONY_REPORT_WRITER, PromptStore, SIGN_DETECTOR};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug)]
struct Check {
    status: Status,
    message: String,
}

impl Check {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

pub async fn run(config: Option<&Path>) -> anyhow::Result<()> {
    println!("🩺 colonylab Doctor: Configuration Diagnostics");
    println!("==============================================\n");

    let checks = match Settings::load(config) {
        Ok(settings) => {
            let mut checks = vec![Check::new(Status::Ok, "Config valid")];
            checks.extend(diagnose(&settings));
            checks
        }
        Err(e) => vec![Check::new(Status::Fail, format!("Config invalid: {e}"))],
    };

    let mut issues = 0;
    for check in &checks {
        let icon = match check.status {
            Status::Ok => "✅",
            Status::Warn => "⚠️ ",
            Status::Fail => "❌",
        };
        if check.status != Status::Ok {
            issues += 1;
        }
        println!("  {icon} {}", check.message);
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    if checks.iter().any(|c| c.status == Status::Fail) {
        anyhow::bail!("colonylab cannot serve with this configuration");
    }
    Ok(())
}

fn diagnose(settings: &Settings) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match settings.require_api_key() {
        Ok(_) => Check::new(Status::Ok, format!("Model key set ({})", settings.model.name)),
        Err(e) => Check::new(Status::Fail, e.to_string()),
    });

    checks.push(match PromptStore::load_or_embedded(settings.prompts_path.as_deref()) {
        Ok(store) => {
            let missing: Vec<&str> = [SIGN_DETECTOR, COLONY_ANALYZER, COLONY_REPORT_WRITER]
                .into_iter()
                .filter(|name| !store.contains(name))
                .collect();
            if missing.is_empty() {
                Check::new(Status::Ok, format!("Prompts loaded ({})", store.names().len()))
            } else {
                Check::new(Status::Fail, format!("Prompts missing: {}", missing.join(", ")))
            }
        }
        Err(e) => Check::new(Status::Fail, format!("Prompts unreadable: {e}")),
    });

    checks.push(match (&settings.mail.resend_api_key, &settings.mail.fallback_to) {
        (Some(_), Some(_)) => Check::new(Status::Ok, "Review emails enabled"),
        (Some(_), None) => Check::new(
            Status::Warn,
            "Review emails enabled without MAIL_FALLBACK_TO; unmatched names will fail",
        ),
        (None, _) => Check::new(Status::Warn, "RESEND_API_KEY not set; review signs will be rejected"),
    });

    checks.push(match settings.database() {
        Some(_) => Check::new(Status::Ok, "Cloudflare D1 configured"),
        None => Check::new(
            Status::Warn,
            "Cloudflare D1 not configured; `colonylab mcp` and reviewer lookup are unavailable",
        ),
    });

    checks
}
