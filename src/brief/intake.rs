//! Project intake form rendered as a Word-friendly HTML document
//! (Calibri 13pt, grey table headers, black cell borders).

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::document::template::escape_html;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDates {
    pub person_requesting: String,
    pub request_received_date: String,
    pub target_estimated_time: String,
    pub target_completion_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub col1: String,
    pub col2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeFormData {
    pub project_name: String,
    pub overview_background: String,
    pub objectives: Vec<String>,
    pub key_dates: KeyDates,
    pub lead_contributors: Vec<Contributor>,
    pub planner_bucket: String,
    pub dependencies_text: String,
    pub evaluation_rows: Vec<EvaluationRow>,
}

/// The blank form: two objective lines, two contributor rows and two
/// evaluation rows.
impl Default for IntakeFormData {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            overview_background: String::new(),
            objectives: vec![String::new(); 2],
            key_dates: KeyDates::default(),
            lead_contributors: vec![Contributor::default(); 2],
            planner_bucket: String::new(),
            dependencies_text: String::new(),
            evaluation_rows: vec![EvaluationRow::default(); 2],
        }
    }
}

const CELL: &str = "border: 1px solid #000; padding: 6px 8px; font-family: Calibri, sans-serif; font-size: 13pt; vertical-align: top;";
const TH: &str = "border: 1px solid #000; padding: 6px 8px; font-family: Calibri, sans-serif; font-size: 13pt; vertical-align: top; background-color: #D9D9D9; font-weight: bold;";
const TABLE_OPEN: &str = r#"<table width="100%" cellspacing="0" cellpadding="0" style="border-collapse: collapse; width: 100%; table-layout: fixed; margin: 6px 0 16px 0;">"#;
const CHECKBOX_LINE: &str = "margin: 4px 0 4px 36px; font-family: Calibri, sans-serif; font-size: 13pt;";

const INTAKE_CSS: &str = r#"
    body { font-family: Calibri, Arial, sans-serif; font-size: 13pt; line-height: 1.4; padding: 20px 60px; max-width: 850px; margin: 0 auto; color: #000; }
    table { border-collapse: collapse; width: 100%; table-layout: fixed; margin: 6px 0 16px 0; }
    h1 { font-family: Calibri, sans-serif; font-size: 15pt; font-weight: bold; text-align: center; margin: 12px 0 16px 0; }
    h2 { font-family: Calibri, sans-serif; font-size: 15pt; font-weight: bold; margin: 16px 0 4px 0; }
    p { font-family: Calibri, sans-serif; font-size: 13pt; margin: 4px 0; }
    ol { margin: 4px 0; padding-left: 28px; font-family: Calibri, sans-serif; font-size: 13pt; }
    ol li { list-style-type: decimal; margin: 3px 0; }
"#;

const ROLL_OUT_STEPS: [(&str, &str); 7] = [
    ("Early Engagement", "Involve staff in the drafting of new policies or initiatives through toolkits, focus groups, or project teams."),
    ("Director Feedback", "Present proposed changes at <em>Decisions and More</em> meetings for Director-level input."),
    ("Manager Feedback", "Share updates at <em>Leadership Exchange</em> meetings to gather feedback from Managers."),
    ("Supervisor/Coach Feedback", "Communicate changes at <em>Provincial Coaching Calls</em> to engage Supervisors and Peer Coaches."),
    ("Formal Publication", "Issue finalized changes through memos and/or highlight them during <strong>Policy Week</strong> (three times annually)."),
    ("Staff Engagement", "Host <strong>Town Halls</strong> to inform all CCB staff, ensuring recordings are available on SharePoint for later access."),
    ("Deeper Dialogue", "Provide <strong>virtual open houses</strong> for Leadership and staff on key topics to allow time for discussion, reflection, and addressing emerging questions."),
];

/// Escaped value, or a non-breaking space so empty cells keep their height.
fn cell_value(value: &str) -> String {
    if value.trim().is_empty() {
        "&nbsp;".into()
    } else {
        escape_html(value)
    }
}

fn two_column_rows<'a>(rows: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (left, right) in rows {
        let _ = write!(
            out,
            "\n    <tr>\n      <td style=\"{CELL}\">{}</td>\n      <td style=\"{CELL}\">{}</td>\n    </tr>",
            cell_value(left),
            cell_value(right)
        );
    }
    out
}

/// Render the intake form. Every user-supplied value is HTML-escaped.
pub fn generate_intake_form_html(data: &IntakeFormData) -> String {
    let title = if data.project_name.trim().is_empty() {
        "Untitled".to_string()
    } else {
        escape_html(&data.project_name)
    };

    let objectives: String = data
        .objectives
        .iter()
        .map(|o| format!("  <p style=\"{CHECKBOX_LINE}\">\u{25A1}&nbsp;&nbsp;{}</p>\n", cell_value(o)))
        .collect();

    let contributors = two_column_rows(
        data.lead_contributors
            .iter()
            .map(|c| (c.name.as_str(), c.role.as_str())),
    );
    let evaluation = two_column_rows(
        data.evaluation_rows
            .iter()
            .map(|r| (r.col1.as_str(), r.col2.as_str())),
    );

    let steps: String = ROLL_OUT_STEPS
        .iter()
        .map(|(name, text)| format!("    <li><strong>{name}</strong> \u{2013} {text}</li>\n"))
        .collect();

    let dates = &data.key_dates;
    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Project Intake Form - {title}</title>
  <style>{INTAKE_CSS}</style>
</head>
<body>

  <h1>Intake Form</h1>

  <p><strong>Project Name:</strong> {project}</p>

  <h2>Overview / Background</h2>
  <p>{overview}</p>

  <h2>Purpose / Deliverable (<em>Specific Objectives</em>):</h2>
{objectives}
  <h2>Key Dates</h2>
  {TABLE_OPEN}
    <colgroup><col width="22%" /><col width="56%" /><col width="22%" /></colgroup>
    <tr>
      <th style="{TH}">Stage</th>
      <th style="{TH}">Update</th>
      <th style="{TH}">Date</th>
    </tr>
    <tr>
      <td style="{CELL}"><strong>Request Received</strong></td>
      <td style="{CELL}">Person(s) requesting: {requesting}</td>
      <td style="{CELL}">{received}</td>
    </tr>
    <tr>
      <td style="{CELL}"><strong>Assigned</strong></td>
      <td style="{CELL}">&nbsp;</td>
      <td style="{CELL}">&nbsp;</td>
    </tr>
    <tr>
      <td style="{CELL}"><strong>Target Completion</strong></td>
      <td style="{CELL}">Estimated time required (In days or weeks): {estimate}</td>
      <td style="{CELL}">{completion}</td>
    </tr>
  </table>

  <h2>Lead Contributors</h2>
  {TABLE_OPEN}
    <colgroup><col width="50%" /><col width="50%" /></colgroup>
    <tr>
      <th style="{TH}">Name</th>
      <th style="{TH}">Role</th>
    </tr>{contributors}
  </table>

  <h2>Dependencies/ Considerations (if applicable)</h2>
  <p style="font-style: italic; font-size: 10pt; color: #444; margin-bottom: 8px;">List any barriers, competing priorities, or required decisions. (Example: “Pending access to ORCA data; potential delay if unavailable by Wednesday.”)</p>
  <p style="{CHECKBOX_LINE}">□&nbsp;&nbsp;Planner Bucket: {bucket}</p>
  <p style="{CHECKBOX_LINE}">□&nbsp;&nbsp;{dependencies}</p>

  <h2>Communications Plan/Roll-Out</h2>
  <p style="font-weight: bold; font-size: 10pt; margin-bottom: 4px;">PPDU Change Management &amp; Communications Process</p>
  <ol>
{steps}  </ol>

  <h2>Evaluation/Monitor &amp; Control</h2>
  {TABLE_OPEN}
    <colgroup><col width="50%" /><col width="50%" /></colgroup>{evaluation}
  </table>

</body>
</html>"#,
        project = escape_html(&data.project_name),
        overview = escape_html(&data.overview_background),
        requesting = escape_html(&dates.person_requesting),
        received = escape_html(&dates.request_received_date),
        estimate = escape_html(&dates.target_estimated_time),
        completion = escape_html(&dates.target_completion_date),
        bucket = escape_html(&data.planner_bucket),
        dependencies = escape_html(&data.dependencies_text),
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::html::{parse_blocks, Block};

    #[test]
    fn empty_form_has_two_rows_each() {
        let form = IntakeFormData::default();
        assert_eq!(form.objectives.len(), 2);
        assert_eq!(form.lead_contributors.len(), 2);
        assert_eq!(form.evaluation_rows.len(), 2);
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let form: IntakeFormData = serde_json::from_str(r#"{"projectName":"Atlas"}"#).unwrap();
        assert_eq!(form.project_name, "Atlas");
        assert_eq!(form.objectives.len(), 2);
    }

    #[test]
    fn sections_in_order() {
        let html = generate_intake_form_html(&IntakeFormData::default());
        let order = [
            "<h1>Intake Form</h1>",
            "Overview / Background",
            "Specific Objectives",
            "Key Dates",
            "Lead Contributors",
            "Dependencies/ Considerations (if applicable)",
            "Communications Plan/Roll-Out",
            "Evaluation/Monitor &amp; Control",
        ];
        let mut from = 0;
        for marker in order {
            let at = html[from..].find(marker).unwrap_or_else(|| panic!("{marker} missing or out of order"));
            from += at + marker.len();
        }
        assert!(html.contains("<title>Project Intake Form - Untitled</title>"));
    }

    #[test]
    fn user_values_escaped() {
        let mut form = IntakeFormData::default();
        form.project_name = "R&D <pilot>".into();
        form.lead_contributors[0].name = "<script>x</script>".into();
        let html = generate_intake_form_html(&form);
        assert!(html.contains("<strong>Project Name:</strong> R&amp;D &lt;pilot&gt;"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn blank_cells_hold_nbsp() {
        let html = generate_intake_form_html(&IntakeFormData::default());
        assert!(html.contains(&format!("<td style=\"{CELL}\">&nbsp;</td>")));
        assert!(html.contains("\u{25A1}&nbsp;&nbsp;&nbsp;</p>"));
    }

    #[test]
    fn tables_survive_block_parsing() {
        let mut form = IntakeFormData::default();
        form.lead_contributors[1] = Contributor {
            name: "Grace".into(),
            role: "Lead".into(),
        };
        let blocks = parse_blocks(&generate_intake_form_html(&form));
        let header_rows = blocks
            .iter()
            .filter(|b| matches!(b, Block::TableRow { header: true, .. }))
            .count();
        assert_eq!(header_rows, 2);
        assert!(blocks
            .iter()
            .any(|b| b.plain_text().contains("Grace") && b.plain_text().contains("Lead")));
        let steps = blocks
            .iter()
            .filter(|b| matches!(b, Block::ListItem { ordered: true, .. }))
            .count();
        assert_eq!(steps, 7);
    }
}
