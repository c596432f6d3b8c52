//! Operator hints for failed deployments
//!
//! Failure text (the error message of a failed call plus any raw subprocess
//! output) is scanned by an ordered list of rules. The first rule that
//! matches emits its hints and stops the scan; a pointer to the FAQ is
//! always emitted last.

use std::fmt::Display;

pub const FAQ_URL: &str = "https://koupleless.io/en/docs/faq/faq/";

/// Receives suggestion lines in order
pub trait SuggestionSink {
    fn suggest(&mut self, line: &str);
}

impl SuggestionSink for Vec<String> {
    fn suggest(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Emits each suggestion as a warn-level tracing event
#[derive(Debug, Default)]
pub struct TracingSink;

impl SuggestionSink for TracingSink {
    fn suggest(&mut self, line: &str) {
        tracing::warn!(event = "suggestion", "{}", line);
    }
}

/// A diagnostic check mapping known failure text to operator guidance
pub struct SuggestionRule {
    pub name: &'static str,
    matches: fn(&[String]) -> bool,
    hints: &'static [&'static str],
}

impl SuggestionRule {
    pub fn matches(&self, lines: &[String]) -> bool {
        (self.matches)(lines)
    }

    pub fn hints(&self) -> &'static [&'static str] {
        self.hints
    }
}

/// Rules in priority order
static RULES: &[SuggestionRule] = &[
    SuggestionRule {
        name: "base_not_started",
        matches: base_not_started,
        hints: &["ensure target base is running"],
    },
    SuggestionRule {
        name: "maven_executable_not_found",
        matches: maven_executable_not_found,
        hints: &["install latest maven or just put mvn executable path into your $PATH"],
    },
    SuggestionRule {
        name: "maven_version_too_low",
        matches: maven_version_too_low,
        hints: &["your maven is outdated, update it to 3.6.1 or higher version"],
    },
    SuggestionRule {
        name: "web_context_path_conflict",
        matches: web_context_path_conflict,
        hints: &[
            "another installed biz module has the same webContextPath as yours",
            "change your <webContextPath> in pom.xml or uninstall another biz module",
        ],
    },
    SuggestionRule {
        name: "application_name_missing",
        matches: application_name_missing,
        hints: &["add \"spring.application.name\" config into your application.properties"],
    },
    SuggestionRule {
        name: "startup_endpoint_autoconfiguration_missing",
        matches: startup_endpoint_autoconfiguration_missing,
        hints: &["import spring-boot-actuator-autoconfiguration artifact in your pom.xml file"],
    },
    SuggestionRule {
        name: "jvm_initialization_failed",
        matches: jvm_initialization_failed,
        hints: &["check your jvm starting parameters"],
    },
];

/// The fixed, ordered rule list
pub fn rules() -> &'static [SuggestionRule] {
    RULES
}

/// Lines of an error message followed by raw subprocess output
pub fn collect_lines(error: Option<&dyn Display>, subprocess_output: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = error
        .map(|err| err.to_string().split('\n').map(str::to_string).collect())
        .unwrap_or_default();
    lines.extend(subprocess_output.iter().cloned());
    lines
}

/// Run the rules over `lines`, emit the first match and the FAQ pointer.
/// Returns the name of the rule that matched, if any.
pub fn suggest(lines: &[String], sink: &mut dyn SuggestionSink) -> Option<&'static str> {
    let matched = RULES.iter().find(|rule| rule.matches(lines));
    if let Some(rule) = matched {
        for hint in rule.hints {
            sink.suggest(hint);
        }
    }
    sink.suggest(&format!("you can go to faq for more help at {}", FAQ_URL));
    matched.map(|rule| rule.name)
}

/// [`collect_lines`] then [`suggest`]
pub fn diagnose(
    error: Option<&dyn Display>,
    subprocess_output: &[String],
    sink: &mut dyn SuggestionSink,
) -> Option<&'static str> {
    suggest(&collect_lines(error, subprocess_output), sink)
}

fn any_line(lines: &[String], predicate: impl Fn(&str) -> bool) -> bool {
    lines.iter().any(|line| predicate(line))
}

fn base_not_started(lines: &[String]) -> bool {
    any_line(lines, |line| {
        line.ends_with("connection refused") && line.contains("installBiz")
    })
}

fn maven_executable_not_found(lines: &[String]) -> bool {
    any_line(lines, |line| {
        line.contains("exec: \"mvn\": executable file not found")
            || line.contains("mvn: command not found")
    })
}

const MAVEN_TOO_OLD_FRAGMENTS: &[&str] = &[
    "Unable to parse configuration of mojo com.alipay.sofa:sofa-ark-maven-plugin",
    "com.google.inject.ProvisionException: Unable to provision",
    "Error injecting: private org.eclipse.aether.spi.log.Logger",
    "Can not set org.eclipse.aether.spi.log.Logger field",
];

fn maven_version_too_low(lines: &[String]) -> bool {
    any_line(lines, |line| {
        MAVEN_TOO_OLD_FRAGMENTS
            .iter()
            .any(|fragment| line.contains(fragment))
    })
}

/// The duplicate child name must show up on or after the first line that
/// reports the web server failing to start
fn web_context_path_conflict(lines: &[String]) -> bool {
    match lines
        .iter()
        .position(|line| line.contains("Unable to start web server"))
    {
        Some(start) => lines[start..]
            .iter()
            .any(|line| line.contains("Child name") && line.contains("is not unique")),
        None => false,
    }
}

fn application_name_missing(lines: &[String]) -> bool {
    any_line(lines, |line| {
        line.contains("spring.application.name must be configured")
    })
}

fn startup_endpoint_autoconfiguration_missing(lines: &[String]) -> bool {
    any_line(lines, |line| {
        line.contains(
            "The following classes could not be excluded because they are not auto-configuration classes",
        ) && line.contains(
            "org.springframework.boot.actuate.autoconfigure.startup.StartupEndpointAutoConfiguration",
        )
    })
}

fn jvm_initialization_failed(lines: &[String]) -> bool {
    any_line(lines, |line| {
        line.contains("Error occurred during initialization of VM")
    })
}
