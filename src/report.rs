use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{
    is_missing_value, AgentSummary, Column, NormalizedRow, ParameterSummary, AUDIT_PARAMETERS,
};
use crate::store::PageView;

const PAGE_COLUMNS: [Column; 6] = [
    Column::CallId,
    Column::Agent,
    Column::Student,
    Column::DateOfCall,
    Column::TotalScore,
    Column::CompletionStatus,
];

pub fn summarize_by_agent(rows: &[&NormalizedRow]) -> Vec<AgentSummary> {
    let mut map: HashMap<&str, (usize, u32)> = HashMap::new();

    for row in rows {
        let entry = map.entry(row.consultant_name.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u32::from(row.total_score);
    }

    let mut summaries: Vec<AgentSummary> = map
        .into_iter()
        .map(|(agent, (calls, total_score))| AgentSummary {
            agent: agent.to_string(),
            calls,
            avg_score: if calls == 0 {
                0.0
            } else {
                f64::from(total_score) / calls as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.agent.cmp(&b.agent))
    });
    summaries
}

/// "Yes" rate per audit parameter among calls where it was answered, weakest first.
pub fn summarize_parameters(rows: &[&NormalizedRow]) -> Vec<ParameterSummary> {
    let mut summaries: Vec<ParameterSummary> = AUDIT_PARAMETERS
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let answers = rows
                .iter()
                .map(|row| row.audit_value(index))
                .filter(|value| !is_missing_value(value));
            let (answered, yes_count) = answers.fold((0, 0), |(answered, yes), value| {
                (answered + 1, yes + usize::from(value == "Yes"))
            });
            ParameterSummary {
                parameter: *parameter,
                yes_count,
                answered,
                yes_rate: if answered == 0 {
                    0.0
                } else {
                    yes_count as f64 / answered as f64
                },
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        a.yes_rate
            .partial_cmp(&b.yes_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summaries
}

pub fn build_report(scope: Option<&str>, rows: &[&NormalizedRow]) -> String {
    let agents = summarize_by_agent(rows);
    let parameters = summarize_parameters(rows);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all calls");

    let _ = writeln!(output, "# Call Audit Summary");
    let _ = writeln!(output, "Generated for {} ({} calls)", scope_label, rows.len());
    let _ = writeln!(output);

    if rows.is_empty() {
        let _ = writeln!(output, "No calls match the current filters.");
        return output;
    }

    let total_score: u32 = rows.iter().map(|row| u32::from(row.total_score)).sum();
    let complete = rows
        .iter()
        .filter(|row| row.call_completion_status == "Complete")
        .count();
    let disconnected = rows.iter().filter(|row| row.call_disconnected == "Yes").count();

    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Average quality score: {:.1} / 10",
        f64::from(total_score) / rows.len() as f64
    );
    let _ = writeln!(output, "- Completed calls: {complete}");
    let _ = writeln!(output, "- Disconnected calls: {disconnected}");
    let _ = writeln!(output);

    let _ = writeln!(output, "## Agents");
    for summary in agents.iter() {
        let _ = writeln!(
            output,
            "- {}: {} calls (avg score {:.1})",
            summary.agent, summary.calls, summary.avg_score
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weakest Audit Parameters");
    let answered: Vec<&ParameterSummary> =
        parameters.iter().filter(|summary| summary.answered > 0).collect();
    if answered.is_empty() {
        let _ = writeln!(output, "No audit parameters were answered.");
    } else {
        for summary in answered.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: {:.0}% yes ({} of {})",
                summary.parameter.replace('_', " "),
                summary.yes_rate * 100.0,
                summary.yes_count,
                summary.answered
            );
        }
    }

    output
}

/// Plain-text table of one page, columns padded to their widest cell.
pub fn render_page(view: &PageView<'_>) -> String {
    let headers: Vec<String> = PAGE_COLUMNS
        .iter()
        .map(|column| column.header().into_owned())
        .collect();
    let cells: Vec<Vec<String>> = view
        .items
        .iter()
        .map(|row| {
            PAGE_COLUMNS
                .iter()
                .map(|column| row.value(*column).into_owned())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            cells
                .iter()
                .filter_map(|line| line.get(index))
                .map(|cell| cell.chars().count())
                .fold(header.chars().count(), usize::max)
        })
        .collect();

    let mut output = String::new();
    write_line(&mut output, &headers, &widths);
    for line in &cells {
        write_line(&mut output, line, &widths);
    }
    if cells.is_empty() {
        let _ = writeln!(output, "(no matching calls)");
    }
    let _ = writeln!(
        output,
        "page {} of {} ({} calls)",
        view.page, view.total_pages, view.total_rows
    );
    output
}

fn write_line(output: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(output, "{}", padded.join("  ").trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    fn rows() -> Vec<NormalizedRow> {
        normalize(&[
            json!({"call_id": "C-1", "Call_Metadata": {"Agent_Name": "Priya", "Student_Name": "Rahul"},
                   "Audit_Parameters": {"Greeting": "Yes", "Empathy": "Yes"},
                   "Call_Status": {"Call_Disconnected": "False", "Call_Completed": "True"}}),
            json!({"call_id": "C-2", "Call_Metadata": {"Agent_Name": "Priya"},
                   "Audit_Parameters": {"Greeting": "Yes", "Empathy": "No"}}),
            json!({"call_id": "C-3", "Call_Metadata": {"Agent_Name": "Arjun"},
                   "Audit_Parameters": {"Greeting": "No", "Empathy": "No"}}),
        ])
        .rows
    }

    #[test]
    fn agents_are_ranked_by_average_score() {
        let rows = rows();
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let summaries = summarize_by_agent(&refs);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].agent, "Priya");
        assert_eq!(summaries[0].calls, 2);
        assert!((summaries[0].avg_score - 7.5).abs() < 0.001);
        assert_eq!(summaries[1].agent, "Arjun");
        assert!(summaries[1].avg_score.abs() < 0.001);
    }

    #[test]
    fn parameter_rates_skip_unanswered_calls() {
        let rows = rows();
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let summaries = summarize_parameters(&refs);

        let empathy = summaries.iter().find(|s| s.parameter == "Empathy").unwrap();
        assert_eq!(empathy.answered, 3);
        assert_eq!(empathy.yes_count, 1);

        let closing = summaries
            .iter()
            .find(|s| s.parameter == "Closing_Statement")
            .unwrap();
        assert_eq!(closing.answered, 0);
        assert_eq!(closing.yes_rate, 0.0);
    }

    #[test]
    fn report_lists_overview_agents_and_weak_parameters() {
        let rows = rows();
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let report = build_report(Some("agent Priya"), &refs);

        assert!(report.contains("Generated for agent Priya (3 calls)"));
        assert!(report.contains("- Completed calls: 1"));
        assert!(report.contains("- Disconnected calls: 2"));
        assert!(report.contains("- Priya: 2 calls (avg score 7.5)"));
        assert!(report.contains("- Empathy: 33% yes (1 of 3)"));
        assert!(!report.contains("Closing Statement"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(None, &[]);
        assert!(report.contains("Generated for all calls (0 calls)"));
        assert!(report.contains("No calls match the current filters."));
    }

    #[test]
    fn page_table_pads_columns_and_prints_position() {
        let rows = rows();
        let view = PageView {
            items: rows.iter().take(2).collect(),
            page: 1,
            total_pages: 2,
            total_rows: 3,
        };
        let table = render_page(&view);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Call ID  Agent Name  Student Name"));
        assert!(lines[1].starts_with("C-1      Priya       Rahul"));
        assert_eq!(lines[3], "page 1 of 2 (3 calls)");
    }
}
