use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use versionup_license::PurchaseCheck;

use crate::coordinator::UpgradeOutcome;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        let line = render_status_line(self.style, status, message);
        let rendered = match self.style {
            OutputStyle::Plain => line,
            OutputStyle::Rich => colorize(status_style(status), &line),
        };
        println!("{rendered}");
    }

    pub(crate) fn print_lines(self, lines: &[(&'static str, String)]) {
        for (status, message) in lines {
            self.print_status(status, message);
        }
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "err" => AnsiColor::BrightRed,
        _ => return Style::new(),
    };
    Style::new().fg_color(Some(color.into()))
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Status-tagged lines describing an upgrade outcome.
pub(crate) fn format_outcome_lines(outcome: &UpgradeOutcome) -> Vec<(&'static str, String)> {
    match outcome {
        UpgradeOutcome::NeedsInstall => vec![(
            "err",
            "application is not installed (no .env file found); run the installer first"
                .to_string(),
        )],
        UpgradeOutcome::UpToDate { current, target } => vec![(
            "ok",
            format!("already up to date: installed v{current}, target v{target}"),
        )],
        UpgradeOutcome::UnknownCurrentVersion { raw } => unknown_version_lines(raw.as_deref()),
        UpgradeOutcome::HookFault {
            from,
            target,
            report,
        } => {
            let mut lines = vec![(
                "err",
                format!("upgrade to v{target} halted; installed version left at v{from}"),
            )];
            lines.extend(report.messages().into_iter().map(|message| ("err", message)));
            if !report.applied.is_empty() {
                lines.push((
                    "warn",
                    format!(
                        "packages applied before the fault were not rolled back: {}",
                        join_versions(&report.applied)
                    ),
                ));
            }
            lines
        }
        UpgradeOutcome::MigrationFailed {
            from,
            to,
            report,
            purchase,
        } => {
            let mut lines = vec![(
                "err",
                format!("upgrade from v{from} to v{to} finished with errors"),
            )];
            lines.extend(report.messages().into_iter().map(|message| ("err", message)));
            lines.push((
                "warn",
                format!("installed version was still set to v{to}; review the failed statements"),
            ));
            lines.extend(purchase_line(purchase.as_ref()));
            lines
        }
        UpgradeOutcome::Upgraded {
            from,
            to,
            report,
            purchase,
        } => {
            let mut lines = vec![(
                "ok",
                format!(
                    "upgraded from v{from} to v{to} ({} package(s) applied)",
                    report.applied.len()
                ),
            )];
            lines.extend(purchase_line(purchase.as_ref()));
            lines
        }
    }
}

fn unknown_version_lines(raw: Option<&str>) -> Vec<(&'static str, String)> {
    let found = match raw {
        Some(value) => format!("APP_VERSION is set to '{value}'"),
        None => "APP_VERSION is missing".to_string(),
    };
    vec![
        (
            "err",
            format!("cannot determine the installed version: {found}"),
        ),
        (
            "info",
            "1. find the version you installed (see the changelog of your release)".to_string(),
        ),
        (
            "info",
            "2. record it with `versionup set-version X.Y.Z` or add APP_VERSION=X.Y.Z to .env"
                .to_string(),
        ),
        ("info", "3. run `versionup upgrade` again".to_string()),
    ]
}

pub(crate) fn purchase_line(purchase: Option<&PurchaseCheck>) -> Option<(&'static str, String)> {
    match purchase? {
        PurchaseCheck::AlreadyChecked => None,
        PurchaseCheck::Validated { .. } => {
            Some(("ok", "purchase code validated".to_string()))
        }
        PurchaseCheck::Rejected { message } => Some(("warn", message.clone())),
    }
}

pub(crate) fn join_versions(versions: &[semver::Version]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
