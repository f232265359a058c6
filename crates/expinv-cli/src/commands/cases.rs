// Command handler for: Cases

use miette::IntoDiagnostic;
use serde::Serialize;

use expinv_engine::cases::builtin_cases;
use expinv_engine::oracle::RecurrenceOracle;

use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct CaseSummary {
    pub(crate) name: &'static str,
    pub(crate) program: &'static str,
    pub(crate) variables: Vec<&'static str>,
    pub(crate) domain: &'static str,
    pub(crate) filtered: bool,
    pub(crate) rule: String,
}

pub(crate) fn case_summaries(pre: &str, post: &str) -> Vec<CaseSummary> {
    builtin_cases()
        .iter()
        .map(|case| CaseSummary {
            name: case.name,
            program: case.program,
            variables: case.variables.to_vec(),
            domain: case.domain,
            filtered: case.has_filter(),
            rule: case.rule(pre, post).to_string(),
        })
        .collect()
}

pub(crate) fn render_cases_text(cases: &[CaseSummary]) -> String {
    let mut out = String::new();
    for case in cases {
        out.push_str(&format!("{} ({})\n", case.name, case.variables.join(",")));
        out.push_str(&format!("  program: {}\n", case.program));
        out.push_str(&format!("  domain:  {}\n", case.domain));
        if case.filtered {
            out.push_str("  ground checks use a filtered box\n");
        }
        out.push_str(&format!("  rule:    {}\n", case.rule));
    }
    out
}

pub(crate) fn run_cases_command(pre: &str, post: &str, format: OutputFormat) -> miette::Result<()> {
    let cases = case_summaries(pre, post);
    match format {
        OutputFormat::Text => print!("{}", render_cases_text(&cases)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cases).into_diagnostic()?),
    }
    Ok(())
}
