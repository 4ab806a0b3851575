use chrono::{Local, NaiveDate};
use poetique_contracts::analysis::trim_float;
use poetique_contracts::{AnalysisResult, AnswerVisibility};

pub const VIEW_ANSWER_HINT: &str = "View Model Answer";
pub const MODEL_RESPONSE_HEADING: &str = "Level 6 Model Response";

/// Visual role of a block. Renderers map each to their own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Title,
    Byline,
    Badge,
    Section,
    Label,
    Body,
    Poem,
    Quote,
    Question,
    Hint,
    KeyPoint,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub style: BlockStyle,
    pub text: String,
}

impl Block {
    fn new(style: BlockStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// The rendered report for one analysis, as an ordered list of styled blocks.
///
/// Built from a snapshot of the result and the visibility map; holds no
/// reference to either afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_on: NaiveDate,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    /// `reveal_all` shows every model answer regardless of `visibility`.
    pub fn build(result: &AnalysisResult, visibility: &AnswerVisibility, reveal_all: bool) -> Self {
        Self::build_on(result, visibility, reveal_all, Local::now().date_naive())
    }

    pub fn build_on(
        result: &AnalysisResult,
        visibility: &AnswerVisibility,
        reveal_all: bool,
        generated_on: NaiveDate,
    ) -> Self {
        let eval = &result.cie_evaluation;
        let mut blocks = vec![
            Block::new(BlockStyle::Title, format!("\"{}\"", result.title)),
            Block::new(
                BlockStyle::Byline,
                format!("Examining the works of {}", result.author),
            ),
            Block::new(BlockStyle::Badge, format!("CIE GRADE: {}", eval.grade)),
            Block::new(
                BlockStyle::Badge,
                format!(
                    "SCORE: {} / {}",
                    trim_float(eval.total_mark),
                    trim_float(eval.max_mark)
                ),
            ),
            Block::new(BlockStyle::Section, "Poem Text"),
            Block::new(BlockStyle::Poem, result.ocr_content.clone()),
            Block::new(BlockStyle::Section, "Critical Reading"),
            Block::new(BlockStyle::Label, "Explicit Meaning"),
            Block::new(BlockStyle::Body, result.meaning.explicit.clone()),
            Block::new(BlockStyle::Label, "Implicit Meaning"),
            Block::new(BlockStyle::Body, result.meaning.implicit.clone()),
            Block::new(BlockStyle::Section, "Tone & Atmosphere"),
            Block::new(BlockStyle::Body, result.tone.description.clone()),
            Block::new(BlockStyle::Label, "Effectiveness"),
            Block::new(BlockStyle::Body, result.tone.effects.clone()),
            Block::new(BlockStyle::Section, "AO2: Literary Devices"),
        ];
        for device in &result.literary_devices {
            blocks.push(Block::new(
                BlockStyle::Label,
                format!("{}: \"{}\"", device.device, device.example),
            ));
            blocks.push(Block::new(BlockStyle::Body, device.effect.clone()));
        }
        blocks.extend([
            Block::new(BlockStyle::Section, "Structure"),
            Block::new(BlockStyle::Body, result.structure.clone()),
            Block::new(BlockStyle::Section, "AO4: Context"),
            Block::new(BlockStyle::Body, result.context.clone()),
            Block::new(BlockStyle::Section, "AO3: Personal Response"),
            Block::new(BlockStyle::Body, result.personal_response.clone()),
            Block::new(BlockStyle::Section, "CIE Literature Practice Paper"),
        ]);
        for (idx, question) in result.exam_questions.iter().enumerate() {
            blocks.push(Block::new(
                BlockStyle::Question,
                format!("{}. {} [{}]", idx + 1, question.question, question.marks),
            ));
            if reveal_all || visibility.is_visible(idx) {
                blocks.push(Block::new(BlockStyle::Label, MODEL_RESPONSE_HEADING));
                blocks.push(Block::new(BlockStyle::Body, question.model_answer.clone()));
                for point in &question.key_points {
                    blocks.push(Block::new(BlockStyle::KeyPoint, point.clone()));
                }
            } else {
                blocks.push(Block::new(BlockStyle::Hint, VIEW_ANSWER_HINT));
            }
        }
        blocks.extend([
            Block::new(BlockStyle::Section, "Summative Examiner Feedback"),
            Block::new(BlockStyle::Label, "AO1: Knowledge & Context"),
            Block::new(BlockStyle::Body, eval.ao1.clone()),
            Block::new(BlockStyle::Label, "AO2: Analysis of Form"),
            Block::new(BlockStyle::Body, eval.ao2.clone()),
            Block::new(BlockStyle::Label, "AO3: Evaluation"),
            Block::new(BlockStyle::Body, eval.ao3.clone()),
            Block::new(BlockStyle::Label, "AO4: Historical Links"),
            Block::new(BlockStyle::Body, eval.ao4.clone()),
            Block::new(BlockStyle::Label, "Final Assessment Notes"),
            Block::new(BlockStyle::Quote, format!("\"{}\"", eval.examiner_comments)),
            Block::new(BlockStyle::Footer, "POETIQUE CIE ADVISORY PANEL"),
            Block::new(
                BlockStyle::Footer,
                format!("SYSTEM VERIFIED {}", generated_on.format("%d/%m/%Y")),
            ),
        ]);

        Self {
            title: result.title.clone(),
            generated_on,
            blocks,
        }
    }

    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            let line = match block.style {
                BlockStyle::Title => block.text.to_uppercase(),
                BlockStyle::Section => format!("\n== {} ==", block.text),
                BlockStyle::Label => format!("-- {}", block.text),
                BlockStyle::Poem => indent(&block.text, "    "),
                BlockStyle::Question => format!("\n{}", block.text),
                BlockStyle::Hint => format!("   ({})", block.text),
                BlockStyle::KeyPoint => format!("   * {}", block.text),
                BlockStyle::Badge => format!("[{}]", block.text),
                BlockStyle::Byline | BlockStyle::Body | BlockStyle::Quote | BlockStyle::Footer => {
                    block.text.clone()
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// A standalone page that prints to A4 from any browser.
    pub fn to_html(&self) -> String {
        let mut body = String::new();
        for block in &self.blocks {
            let text = escape_html(&block.text);
            let element = match block.style {
                BlockStyle::Title => format!("<h1>{text}</h1>"),
                BlockStyle::Byline => format!("<p class=\"byline\">{text}</p>"),
                BlockStyle::Badge => format!("<span class=\"badge\">{text}</span>"),
                BlockStyle::Section => format!("<h2>{text}</h2>"),
                BlockStyle::Label => format!("<h3>{text}</h3>"),
                BlockStyle::Body => format!("<p>{text}</p>"),
                BlockStyle::Poem => format!("<pre class=\"poem\">{text}</pre>"),
                BlockStyle::Quote => format!("<blockquote>{text}</blockquote>"),
                BlockStyle::Question => format!("<p class=\"question\">{text}</p>"),
                BlockStyle::Hint => format!("<p class=\"hint\">{text}</p>"),
                BlockStyle::KeyPoint => format!("<span class=\"point\">{text}</span>"),
                BlockStyle::Footer => format!("<p class=\"footer\">{text}</p>"),
            };
            body.push_str("    ");
            body.push_str(&element);
            body.push('\n');
        }
        format!(
            "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\" />\n  \
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n  \
<title>CIE Literature Report - {title}</title>\n  <style>{REPORT_CSS}</style>\n</head>\n\
<body>\n  <main>\n{body}  </main>\n</body>\n</html>\n",
            title = escape_html(&self.title),
        )
    }
}

const REPORT_CSS: &str = "
    @page { size: A4; margin: 16mm; }
    body { margin: 0; background: #f8fafc; color: #1e293b; font-family: Georgia, 'Times New Roman', serif; }
    main { max-width: 800px; margin: 0 auto; padding: 32px; background: #fff; }
    h1 { font-size: 34px; margin: 0 0 4px; }
    h2 { font-size: 20px; margin: 28px 0 8px; border-bottom: 1px solid #e2e8f0; padding-bottom: 4px; }
    h3 { font-size: 13px; margin: 14px 0 4px; text-transform: uppercase; letter-spacing: 0.06em; color: #4f46e5; }
    p { line-height: 1.6; margin: 0 0 8px; }
    .byline { color: #64748b; font-style: italic; }
    .badge { display: inline-block; margin: 8px 8px 0 0; padding: 4px 12px; border-radius: 999px; background: #eef2ff; font-weight: bold; font-size: 13px; }
    .poem { white-space: pre-wrap; font-family: Georgia, serif; font-style: italic; line-height: 1.8; background: #f8fafc; padding: 16px; border-radius: 12px; }
    .question { font-weight: bold; margin-top: 16px; }
    .hint { color: #94a3b8; font-size: 13px; }
    .point { display: inline-block; margin: 0 6px 6px 0; padding: 2px 10px; border-radius: 6px; background: #f1f5f9; font-size: 12px; }
    blockquote { margin: 0; padding: 12px 16px; border-left: 4px solid #4f46e5; font-style: italic; }
    .footer { font-size: 11px; letter-spacing: 0.12em; color: #94a3b8; text-align: center; }
";

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use poetique_contracts::AnswerVisibility;

    use super::{escape_html, BlockStyle, ReportDocument, VIEW_ANSWER_HINT};
    use crate::testing::sample_result;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn sections_follow_the_report_order() {
        let doc = ReportDocument::build_on(&sample_result(), &AnswerVisibility::new(), false, date());
        let sections: Vec<&str> = doc
            .blocks
            .iter()
            .filter(|block| block.style == BlockStyle::Section)
            .map(|block| block.text.as_str())
            .collect();
        assert_eq!(
            sections,
            [
                "Poem Text",
                "Critical Reading",
                "Tone & Atmosphere",
                "AO2: Literary Devices",
                "Structure",
                "AO4: Context",
                "AO3: Personal Response",
                "CIE Literature Practice Paper",
                "Summative Examiner Feedback",
            ]
        );
        assert_eq!(doc.blocks[0].text, "\"Ozymandias\"");
        assert_eq!(doc.blocks[3].text, "SCORE: 18 / 25");
        assert_eq!(
            doc.blocks.last().map(|block| block.text.as_str()),
            Some("SYSTEM VERIFIED 15/10/2026")
        );
    }

    #[test]
    fn hidden_answers_show_a_hint_and_revealed_ones_show_key_points() {
        let result = sample_result();
        let mut visibility = AnswerVisibility::new();
        visibility.toggle(0);
        let text = ReportDocument::build_on(&result, &visibility, false, date()).to_plain_text();
        assert!(text.contains("1. How does Shelley present the power of time? [25]"));
        assert!(text.contains("Shelley frames the statue second-hand..."));
        assert!(text.contains("* framing narrative"));
        assert!(!text.contains("The inscription's boast is undercut..."));
        assert_eq!(text.matches(VIEW_ANSWER_HINT).count(), 2);

        let all = ReportDocument::build_on(&result, &AnswerVisibility::new(), true, date())
            .to_plain_text();
        assert_eq!(all.matches(VIEW_ANSWER_HINT).count(), 0);
        assert_eq!(all.matches("Level 6 Model Response").count(), 3);
    }

    #[test]
    fn html_is_escaped_and_keeps_poem_line_breaks() {
        let mut result = sample_result();
        result.title = "<script>alert('x')</script>".to_string();
        let html = ReportDocument::build_on(&result, &AnswerVisibility::new(), false, date())
            .to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("antique land,\nWho said"));
        assert!(html.starts_with("<!doctype html>"));
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html("a&b \"c\" 'd'"), "a&amp;b &quot;c&quot; &#39;d&#39;");
    }
}
