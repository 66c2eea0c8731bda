//! Compile and run pickaxe scripts

use std::io::Write;
use std::sync::Arc;

use super::{CliError, table_to_json};
use crate::ast::visit::ProgramSummary;
use crate::{DomFactory, RequestFactory, Runnable, RuntimeConfig, RuntimeTable, compile, output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Boxed text grid per table
    #[default]
    Text,
    /// One JSON array of row objects per table
    Json,
}

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Script source
    pub script: String,
    pub format: OutputFormat,
    /// Pretty-print JSON output
    pub pretty: bool,
    pub config: RuntimeConfig,
}

/// Result of a check operation
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// Script parsed and resolved
    Valid(ProgramSummary),
}

/// Parses and resolves a script without running it.
pub fn execute_check(script: &str) -> Result<CheckResult, CliError> {
    let mut program = crate::parser::parse_program(script).map_err(crate::Error::from)?;
    crate::resolver::resolve(&mut program).map_err(crate::Error::from)?;
    Ok(CheckResult::Valid(ProgramSummary::of(&program)))
}

/// Runs a script, writing each select's table to `out` as it completes.
///
/// Returns the number of tables written.
pub fn execute_run(
    options: &RunOptions,
    requests: Arc<dyn RequestFactory>,
    dom: Arc<dyn DomFactory>,
    out: &mut dyn Write,
) -> Result<usize, CliError> {
    let plan = compile(&options.script)?;
    let runnable = Runnable::new(plan, requests, dom).with_config(options.config.clone());

    let mut written = 0;
    let mut failure: Option<CliError> = None;
    runnable
        .run(|table| {
            if failure.is_some() {
                return;
            }
            let result = render(&table, options.format, options.pretty)
                .and_then(|text| out.write_all(text.as_bytes()).map_err(CliError::from));
            match result {
                Ok(()) => written += 1,
                Err(e) => failure = Some(e),
            }
        })
        .map_err(crate::Error::from)?;

    match failure {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

pub fn render(table: &RuntimeTable, format: OutputFormat, pretty: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => Ok(output::to_text(table)),
        OutputFormat::Json => {
            let json = table_to_json(table);
            let mut text = if pretty {
                serde_json::to_string_pretty(&json)?
            } else {
                serde_json::to_string(&json)?
            };
            text.push('\n');
            Ok(text)
        }
    }
}
