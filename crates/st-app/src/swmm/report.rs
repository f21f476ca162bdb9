//! Continuity errors from the engine's text report.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Continuity {
    /// Flow routing continuity error, percent.
    pub flow_error: f64,
    /// Quality routing continuity error of one pollutant, percent.
    pub quality_error: f64,
}

enum Block {
    Flow,
    /// Pollutant names of the table columns.
    Quality(Vec<String>),
    Other,
}

fn numbers(line: &str) -> Vec<f64> {
    line.split_whitespace()
        .filter_map(|t| t.parse::<f64>().ok())
        .collect()
}

/// Column names printed on the asterisk line above a continuity heading.
fn column_names(line: &str) -> Vec<String> {
    line.split_whitespace()
        .filter(|t| !t.chars().all(|c| c == '*'))
        .map(str::to_string)
        .collect()
}

/// Read the flow routing and quality routing continuity errors.
///
/// Missing tables leave the corresponding error at zero.
pub fn parse_continuity(report: &str, pollutant: &str) -> Continuity {
    let mut continuity = Continuity::default();
    let mut block = Block::Other;
    let mut previous = "";
    for line in report.lines() {
        let trimmed = line.trim();
        if trimmed.contains("Continuity") && !trimmed.starts_with("Continuity Error") {
            block = if trimmed.starts_with("Flow Routing Continuity") {
                Block::Flow
            } else if trimmed.starts_with("Quality Routing Continuity") {
                Block::Quality(column_names(previous))
            } else {
                Block::Other
            };
        } else if trimmed.starts_with("Continuity Error") {
            let values = numbers(trimmed);
            match &block {
                Block::Flow => {
                    if let Some(v) = values.first() {
                        continuity.flow_error = *v;
                    }
                }
                Block::Quality(names) => {
                    let column = names.iter().position(|n| n == pollutant).unwrap_or(0);
                    if let Some(v) = values.get(column) {
                        continuity.quality_error = *v;
                    }
                }
                Block::Other => {}
            }
        }
        previous = trimmed;
    }
    continuity
}
