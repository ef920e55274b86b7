//! CLI Output Formatting.
//!
//! Renders quotes and simulation reports as text or JSON.

use console::style;
use serde::Serialize;

use crate::cli::scenario::SimulationReport;
use crate::core::debt::DebtLedger;
use crate::core::fees::FeeQuote;
use crate::error::{Error, Result};
use crate::protocol::events::WrapperEvent;
use crate::utils::math::format_units;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

fn to_json<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    let output = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    output.map_err(|e| Error::Serialization(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUOTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct QuoteView<'a> {
    kind: &'a str,
    gross: String,
    principal: String,
    fee: String,
}

/// Render a fee quote
pub fn render_quote(kind: &str, quote: &FeeQuote, format: OutputFormat) -> Result<String> {
    let view = QuoteView {
        kind,
        gross: format_units(quote.gross),
        principal: format_units(quote.principal),
        fee: format_units(quote.fee),
    };
    match format {
        OutputFormat::Text => Ok(format!(
            "{} {}\n  principal: {}\n  fee:       {}",
            style(kind).bold(),
            view.gross,
            view.principal,
            view.fee
        )),
        _ => to_json(&view, format),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════════

fn describe_event(event: &WrapperEvent) -> String {
    match event {
        WrapperEvent::Minted(e) => format!(
            "Minted        #{} {} principal {} fee {} (in {})",
            e.sequence,
            e.account.short(),
            format_units(e.principal),
            format_units(e.fee),
            format_units(e.amount_in)
        ),
        WrapperEvent::Burned(e) => format!(
            "Burned        #{} {} principal {} fee {} (in {})",
            e.sequence,
            e.account.short(),
            format_units(e.principal),
            format_units(e.fee),
            format_units(e.amount_in)
        ),
        WrapperEvent::FeesClaimed(e) => format!(
            "FeesClaimed   #{} {} -> {} stable to {}",
            e.sequence,
            format_units(e.amount),
            format_units(e.amount_stable),
            e.fee_pool.short()
        ),
        WrapperEvent::SettingsChanged(e) => format!(
            "SettingsChanged #{} {}: {} -> {}",
            e.sequence, e.parameter, e.old_value, e.new_value
        ),
    }
}

fn describe_ledger(ledger: &DebtLedger) -> Vec<String> {
    vec![
        format!(
            "issued collateral synth: {}",
            format_units(ledger.issued_collateral_synth)
        ),
        format!(
            "burnt collateral synth:  {}",
            format_units(ledger.burnt_collateral_synth)
        ),
        format!(
            "net issued:              {}",
            format_units(ledger.net_issued_collateral_synth())
        ),
        format!(
            "issued stable synth:     {}",
            format_units(ledger.issued_stable_synth)
        ),
        format!("escrowed fees:           {}", format_units(ledger.escrowed_fees)),
    ]
}

/// Render a simulation report
pub fn render_report(report: &SimulationReport, format: OutputFormat) -> Result<String> {
    if format != OutputFormat::Text {
        return to_json(report, format);
    }

    let mut lines = Vec::new();
    lines.push(style("=== Steps ===").cyan().bold().to_string());
    for step in &report.steps {
        let marker = if step.ok {
            style("✓").green()
        } else {
            style("✗").red()
        };
        lines.push(format!(
            "{} {:>3} {:<16} {}",
            marker, step.index, step.action, step.detail
        ));
    }

    lines.push(String::new());
    lines.push(style("=== Events ===").cyan().bold().to_string());
    lines.extend(report.events.iter().map(describe_event));

    lines.push(String::new());
    lines.push(style("=== Ledger ===").cyan().bold().to_string());
    lines.extend(describe_ledger(&report.ledger));
    lines.push(format!("reserves:                {}", report.reserves));
    lines.push(format!("capacity:                {}", report.capacity));
    lines.push(format!(
        "utilization:             {:.2}%",
        report.utilization_bps as f64 / 100.0
    ));
    lines.push(format!("event digest:            {}", report.event_digest));

    lines.push(String::new());
    lines.push(style("=== Tokens ===").cyan().bold().to_string());
    for token in &report.tokens {
        lines.push(format!(
            "{:<6} supply {:<12} holders {:<4} ops {:<5} {}",
            token.symbol,
            token.total_supply,
            token.holders,
            token.operations.len(),
            &token.state_hash[..token.state_hash.len().min(16)]
        ));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::scenario::{StepOutcome, TokenSummary};
    use crate::utils::math::units;

    fn report() -> SimulationReport {
        SimulationReport {
            steps: vec![StepOutcome {
                index: 1,
                action: "mint".into(),
                ok: false,
                detail: "Wrapper is paused".into(),
                error_code: Some(1001),
            }],
            events: Vec::new(),
            ledger: DebtLedger::default(),
            reserves: "0".into(),
            capacity: "5000".into(),
            utilization_bps: 0,
            event_digest: "00".into(),
            tokens: vec![TokenSummary {
                symbol: "sETH".into(),
                total_supply: "0".into(),
                holders: 0,
                state_hash: "ab".repeat(32),
                operations: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_report_json() {
        let json = render_report(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["steps"][0]["error_code"], 1001);
        assert_eq!(value["capacity"], "5000");
    }

    #[test]
    fn test_report_text_contains_sections() {
        let text = render_report(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("Steps"));
        assert!(text.contains("Wrapper is paused"));
        assert!(text.contains("capacity:"));
        assert!(text.contains("utilization:             0.00%"));
        assert!(text.contains("sETH   supply 0"));
    }

    #[test]
    fn test_quote_json() {
        let quote = FeeQuote {
            gross: units(50),
            principal: units(49),
            fee: units(1),
        };
        let json = render_quote("mint", &quote, OutputFormat::Json).unwrap();
        assert!(json.contains("\"fee\":\"1\""));
    }
}
