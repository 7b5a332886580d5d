use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct OutputMeta {
    pub command: &'static str,
    pub generated_at: String,
    pub warnings: Vec<String>,
}

/// Document written to stdout for every command result.
#[derive(Debug, Serialize)]
pub struct Output {
    pub meta: OutputMeta,
    pub data: Value,
}

impl Output {
    pub fn new(command: &'static str, result: CommandResult) -> Self {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"));

        Self {
            meta: OutputMeta {
                command,
                generated_at,
                warnings: result.warnings,
            },
            data: result.data,
        }
    }
}

pub fn render(output: &Output, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(output)?
            } else {
                serde_json::to_string(output)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(output)?),
    }

    Ok(())
}

fn render_table(output: &Output) -> Result<String, CliError> {
    let mut text = String::new();
    text.push_str(&format!("command     : {}\n", output.meta.command));
    text.push_str(&format!("generated_at: {}\n", output.meta.generated_at));

    if !output.meta.warnings.is_empty() {
        text.push_str("warnings:\n");
        for warning in &output.meta.warnings {
            text.push_str(&format!("  - {warning}\n"));
        }
    }

    text.push_str("data:\n");
    let pretty_data = serde_json::to_string_pretty(&output.data)?;
    for line in pretty_data.lines() {
        text.push_str(&format!("  {line}\n"));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn table_lists_warnings_before_indented_data() {
        let output = Output {
            meta: OutputMeta {
                command: "resolve",
                generated_at: String::from("2025-09-01T09:15:00Z"),
                warnings: vec![String::from("quote batch 1 failed: timeout")],
            },
            data: json!({ "cycle": "25SEP" }),
        };

        let table = render_table(&output).expect("render");
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "command     : resolve");
        assert_eq!(lines[2], "warnings:");
        assert_eq!(lines[3], "  - quote batch 1 failed: timeout");
        assert_eq!(lines[4], "data:");
        assert!(lines[6].contains("\"cycle\": \"25SEP\""));
    }

    #[test]
    fn meta_carries_command_warnings() {
        let result = CommandResult::ok(json!([])).with_warning("enrichment disabled");
        let output = Output::new("gainers", result);
        assert_eq!(output.meta.warnings, vec!["enrichment disabled"]);
        assert!(output.meta.generated_at.contains('T'));
    }
}
