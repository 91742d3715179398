//! Output formatting utilities

use colored::*;
use tabled::{Table, Tabled};
use tripwire_engine::{ApplyReport, PassReport};

use crate::error::CliResult;

/// Output format for pass reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Summary plus a table of actions
    #[default]
    Text,
    /// The full report as JSON
    Json,
}

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Alarm")]
    alarm: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Render a pass report in the requested format
pub fn render_report(report: &PassReport, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &PassReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { "plan" } else { "apply" };

    out.push_str(&format!(
        "{} {} run {} for prefix {:?}\n",
        "▸".blue(),
        mode.bold(),
        report.run_id,
        report.prefix
    ));
    out.push_str(&format!(
        "  {} resources matched, {} to create, {} to delete, {} unchanged\n",
        report.resources_matched, report.plan.create, report.plan.delete, report.plan.unchanged
    ));

    for failure in &report.discovery_failures {
        out.push_str(&format!(
            "{} discovery failed for {} ({}): {}\n",
            "⚠".yellow(),
            failure.key,
            failure.resource_type,
            failure.cause
        ));
    }
    if !report.protected.is_empty() {
        out.push_str(&format!(
            "{} {} deletions held back until discovery succeeds\n",
            "⚠".yellow(),
            report.protected.len()
        ));
    }

    let rows = action_rows(report);
    if rows.is_empty() {
        out.push_str(&format!("{}\n", "No changes".dimmed()));
    } else {
        out.push_str(&Table::new(rows).to_string());
        out.push('\n');
    }

    match &report.apply {
        Some(apply) if apply.is_clean() => out.push_str(&format!(
            "{} {} created, {} deleted ({} API calls)\n",
            "✓".green(),
            apply.created.len(),
            apply.deleted.len(),
            apply.api_calls
        )),
        Some(apply) => out.push_str(&format!(
            "{} {} created, {} deleted, {} failed\n",
            "✗".red(),
            apply.created.len(),
            apply.deleted.len(),
            apply.failures.len()
        )),
        None => {}
    }

    out
}

fn action_rows(report: &PassReport) -> Vec<ActionRow> {
    let status = |name: &str, apply: Option<&ApplyReport>| -> String {
        match apply {
            None => "planned".to_string(),
            Some(apply) => match apply.failures.iter().find(|f| f.name == name) {
                Some(failure) => format!("failed: {}", failure.cause),
                None => "done".to_string(),
            },
        }
    };

    let creates = report.to_create.iter().map(|name| ActionRow {
        action: "create".to_string(),
        alarm: name.clone(),
        status: status(name, report.apply.as_ref()),
    });
    let deletes = report.to_delete.iter().map(|name| ActionRow {
        action: "delete".to_string(),
        alarm: name.clone(),
        status: status(name, report.apply.as_ref()),
    });
    let protected = report.protected.iter().map(|name| ActionRow {
        action: "keep".to_string(),
        alarm: name.clone(),
        status: "protected".to_string(),
    });

    creates.chain(deletes).chain(protected).collect()
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tripwire_engine::{ApplyAction, ApplyFailure, CloudError, PlanSummary};

    fn report(apply: Option<ApplyReport>) -> PassReport {
        PassReport {
            run_id: Default::default(),
            prefix: "tw-".to_string(),
            dry_run: apply.is_none(),
            resources_matched: 2,
            plan: PlanSummary {
                create: 2,
                delete: 1,
                unchanged: 0,
            },
            to_create: vec!["tw-lambda-a-Errors".into(), "tw-lambda-b-Errors".into()],
            to_delete: vec!["tw-lambda-old-Errors".into()],
            discovery_failures: vec![],
            protected: vec![],
            apply,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_plan_lists_planned_actions() {
        let text = render_report(&report(None), OutputFormat::Text).unwrap();
        assert!(text.contains("tw-lambda-a-Errors"));
        assert!(text.contains("tw-lambda-old-Errors"));
        assert!(text.contains("planned"));
    }

    #[test]
    fn test_failed_items_show_cause() {
        let apply = ApplyReport {
            created: vec!["tw-lambda-a-Errors".into()],
            deleted: vec!["tw-lambda-old-Errors".into()],
            failures: vec![ApplyFailure {
                name: "tw-lambda-b-Errors".into(),
                action: ApplyAction::Create,
                cause: CloudError::api("ValidationError", "bad"),
                attempts: 1,
            }],
            api_calls: 3,
        };
        let text = render_report(&report(Some(apply)), OutputFormat::Text).unwrap();
        assert!(text.contains("failed: API error ValidationError: bad"));
        assert!(text.contains("1 failed"));
    }

    #[test]
    fn test_json_is_the_full_report() {
        let json = render_report(&report(None), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["plan"]["create"], 2);
        assert!(value["apply"].is_null());
    }
}
