//! Wikitext report of a producer-page run.

use chrono::NaiveDate;

use pagebot_pipeline::PipelineState;

use crate::producer::EditStats;

/// Category the report page files itself under.
const REPORT_CATEGORY: &str = "Error/Producer pages/PWT";

/// Render the report page for a finished run.
///
/// Errors and unplaced entries are listed by page title.
pub fn render_report(
    state: &PipelineState<EditStats, Vec<String>>,
    producers_category: &str,
    date: NaiveDate,
) -> String {
    let mut out = format!("Report generated {}", date.format("%B %d, %Y"));
    out.push_str(&format!(
        "\n\n'''''This is a bot-generated report, iterating through the producer pages in [[:{producers_category}]]'''''\n\n"
    ));
    out.push_str(&format!(
        "''Pages with errors:''\n<categorytree namespaces=0 hideroot=on>{REPORT_CATEGORY}</categorytree>\n\n\n"
    ));

    if !state.errors.is_empty() {
        let mut errors: Vec<_> = state.errors.iter().collect();
        errors.sort();
        out.push_str(
            "'''''The bot was not able to update the producer works tables for the following pages''''':\n\n",
        );
        for (title, message) in errors {
            out.push_str(&format!("*[[{title}]], {message}\n"));
        }
    }

    let mut unplaced: Vec<_> = state
        .failures
        .iter()
        .filter(|(_, entries)| !entries.is_empty())
        .collect();
    if unplaced.is_empty() {
        out.push_str(
            "\n\n''All song/album pages in the respective producer categories have been included in the producer pages.''",
        );
    } else {
        unplaced.sort_by(|a, b| a.0.cmp(&b.0));
        out.push_str("\n\n''The following producer pages are missing these song/album pages:''\n\n");
        for (title, entries) in unplaced {
            out.push_str(&format!("=='''[[{title}]]'''==\n"));
            let bullets: Vec<String> = entries.iter().map(|e| format!("*[[{e}]]")).collect();
            out.push_str(&bullets.join("\n"));
            out.push_str("\n\n");
        }
    }

    out.push_str(&format!("\n[[Category:{REPORT_CATEGORY}|!]]"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn clean_run_report() {
        let state = PipelineState::default();
        let report = render_report(&state, "Category:Producers", date());
        assert_eq!(
            report,
            "Report generated March 09, 2024\n\n\
'''''This is a bot-generated report, iterating through the producer pages in [[:Category:Producers]]'''''\n\n\
''Pages with errors:''\n<categorytree namespaces=0 hideroot=on>Error/Producer pages/PWT</categorytree>\n\n\n\
\n\n''All song/album pages in the respective producer categories have been included in the producer pages.''\
\n[[Category:Error/Producer pages/PWT|!]]"
        );
    }

    #[test]
    fn lists_errors_and_unplaced_entries() {
        let mut state: PipelineState<EditStats, Vec<String>> = PipelineState::default();
        state.errors = vec![
            ("Zeta".into(), "Page is a redirect".into()),
            ("Alpha".into(), "cannot find producer works table".into()),
        ];
        state.failures = vec![(
            "Alpha".into(),
            vec!["Song (album)".to_string(), "Other".to_string()],
        )];

        let report = render_report(&state, "Category:Producers", date());
        assert!(report.contains(
            "following pages''''':\n\n*[[Alpha]], cannot find producer works table\n*[[Zeta]], Page is a redirect\n"
        ));
        assert!(report.contains("=='''[[Alpha]]'''==\n*[[Song (album)]]\n*[[Other]]\n\n"));
        assert!(!report.contains("All song/album pages"));
        assert!(report.ends_with("\n[[Category:Error/Producer pages/PWT|!]]"));
    }
}
