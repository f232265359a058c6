pub(crate) mod cases;
pub(crate) mod synth;

use crate::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

/// Parse a flag value with its `FromStr` implementation.
pub(crate) fn parse_flag<T>(flag: &str, raw: &str) -> miette::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse()
        .map_err(|message: String| miette::miette!("--{flag}: {message}"))
}
