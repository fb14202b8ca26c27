use std::io::{IsTerminal, Write};

use caravan_core::{ApiFailure, OptionValue, SelectOption};
use serde::Serialize;
use serde_json::Value;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::args::OutputFormat;

fn stdout() -> StandardStream {
    let choice = if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn stderr() -> StandardStream {
    let choice = if std::io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stderr(choice)
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line failure summary on stderr, plus any field errors
pub fn print_failure(failure: &ApiFailure) -> anyhow::Result<()> {
    let mut err = stderr();

    err.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(err, "Request failed ({})", failure.status)?;
    err.reset()?;
    writeln!(err, ": {}", failure.error)?;

    for field in failure.field_errors() {
        err.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(err, "  {}", field.field)?;
        err.reset()?;
        writeln!(err, ": {}", field.message)?;
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionListing<'a> {
    pub options: &'a [SelectOption<Value>],
    pub selected: Option<&'a OptionValue>,
    pub pages: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

pub fn print_options(listing: &OptionListing, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(listing),
        OutputFormat::Plain => {
            for option in listing.options {
                println!("{}\t{}", option.value, option.label);
            }
            Ok(())
        }
        OutputFormat::Pretty => print_options_pretty(listing),
    }
}

fn print_options_pretty(listing: &OptionListing) -> anyhow::Result<()> {
    let mut out = stdout();
    let width = listing
        .options
        .iter()
        .map(|o| o.value.as_str().len())
        .max()
        .unwrap_or(0);

    for option in listing.options {
        let is_selected = listing.selected == Some(&option.value);
        if is_selected {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(out, "* ")?;
        } else {
            write!(out, "  ")?;
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(out, "{:width$}", option.value.as_str(), width = width)?;
        out.reset()?;
        writeln!(out, "  {}", option.label)?;
    }

    out.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(
        out,
        "{} options from {} page(s)",
        listing.options.len(),
        listing.pages
    )?;
    if let Some(total) = listing.total_count {
        write!(out, ", {} in total", total)?;
    }
    if listing.has_more {
        write!(out, ", more available")?;
    }
    out.reset()?;
    writeln!(out)?;

    Ok(())
}
