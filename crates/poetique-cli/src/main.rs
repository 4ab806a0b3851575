use std::fs;
use std::io::{self, ErrorKind, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use poetique_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use poetique_contracts::events::EventWriter;
use poetique_contracts::{AnalysisResult, AnswerVisibility};
use poetique_engine::export::report_file_name;
use poetique_engine::session::load_payload;
use poetique_engine::{
    analyze_blocking, AnalysisClient, AnalysisConfig, AnalysisError, ExportOptions, ExportOutcome,
    GeminiAnalysisClient, ImagePayload, ImagePreview, ReportDocument, ReportExporter, RequestToken,
    Resolution, SessionController,
};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(
    name = "poetique",
    version,
    about = "CIE-style literary analysis of a photographed poem"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one poem photo and print the report.
    Analyze(AnalyzeArgs),
    /// Interactive session: upload, toggle answers, export.
    Session(SessionArgs),
    /// Re-render a saved analysis without calling the service.
    Render(RenderArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(long, default_value = "poetique-out")]
    out: PathBuf,
    #[arg(long)]
    font: Option<PathBuf>,
    /// Pause before capturing the report for PDF export.
    #[arg(long)]
    settle_ms: Option<u64>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    pdf: bool,
    #[arg(long)]
    html: bool,
    /// Comma-separated 1-based question numbers whose model answers to show.
    #[arg(long)]
    show_answers: Option<String>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[command(flatten)]
    output: OutputArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct RenderArgs {
    #[arg(long)]
    result: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
    #[arg(long)]
    pdf: bool,
    #[arg(long)]
    html: bool,
    #[arg(long)]
    show_answers: Option<String>,
}

const RESULT_FILE_NAME: &str = "analysis.json";

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("poetique error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Render(args) => run_render(args),
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn event_writer(out: &Path, events: Option<PathBuf>) -> EventWriter {
    EventWriter::new(
        events.unwrap_or_else(|| out.join("events.jsonl")),
        new_session_id(),
    )
}

fn export_options(output: &OutputArgs) -> ExportOptions {
    let mut options = ExportOptions::from_env().with_font_path(output.font.clone());
    if let Some(ms) = output.settle_ms {
        options.settle = Duration::from_millis(ms);
    }
    options
}

fn build_client(model: Option<String>) -> GeminiAnalysisClient {
    GeminiAnalysisClient::new(AnalysisConfig::from_env().with_model(model))
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let shown = parse_show_answers(args.show_answers.as_deref())?;
    fs::create_dir_all(&args.output.out)
        .with_context(|| format!("failed creating {}", args.output.out.display()))?;
    let events = event_writer(&args.output.out, args.events.clone());
    let client = build_client(args.model.clone());
    let mut controller = SessionController::new(events.clone());

    println!("Analyzing {} with {}...", args.image.display(), client.config().model);
    analyze_blocking(&mut controller, &client, &args.image);
    if let Some(message) = controller.error_message() {
        eprintln!("Analysis failed: {message}");
        return Ok(1);
    }
    let saved = save_then_reveal(&mut controller, &shown, &args.output.out)?;
    println!("Saved analysis to {}", saved.display());

    let Some((result, visibility)) = controller.completed_mut() else {
        bail!("analysis finished without a result");
    };
    finish_report(
        result,
        visibility,
        &args.output,
        args.pdf,
        args.html,
        &events,
    )
}

/// Persists the completed analysis first so a bad question number cannot
/// lose it, then shows the requested answers, skipping unknown ones.
fn save_then_reveal(
    controller: &mut SessionController,
    shown: &[usize],
    out: &Path,
) -> Result<PathBuf> {
    let Some(result) = controller.result() else {
        bail!("analysis finished without a result");
    };
    let saved = write_result_json(result, out)?;
    for idx in shown {
        if let Err(err) = controller.toggle_answer(*idx) {
            eprintln!("poetique warning: {err}; ignoring --show-answers entry");
        }
    }
    Ok(saved)
}

fn run_render(args: RenderArgs) -> Result<i32> {
    let raw = fs::read_to_string(&args.result)
        .with_context(|| format!("failed reading {}", args.result.display()))?;
    let result = AnalysisResult::from_json_str(&raw)
        .with_context(|| format!("{} is not a complete analysis", args.result.display()))?;
    let mut visibility = AnswerVisibility::new();
    for idx in parse_show_answers(args.show_answers.as_deref())? {
        if idx >= result.question_count() {
            bail!(
                "question {} does not exist (have {})",
                idx + 1,
                result.question_count()
            );
        }
        visibility.toggle(idx);
    }
    let events = EventWriter::disabled(new_session_id());
    finish_report(
        &result,
        &mut visibility,
        &args.output,
        args.pdf,
        args.html,
        &events,
    )
}

fn finish_report(
    result: &AnalysisResult,
    visibility: &mut AnswerVisibility,
    output: &OutputArgs,
    pdf: bool,
    html: bool,
    events: &EventWriter,
) -> Result<i32> {
    println!();
    print!(
        "{}",
        ReportDocument::build(result, visibility, false).to_plain_text()
    );

    let mut code = 0;
    if html {
        let path = write_html_report(result, visibility, &output.out)?;
        println!("HTML report: {}", path.display());
    }
    if pdf {
        let exporter = ReportExporter::with_glyph_rasterizer(export_options(output), events.clone());
        if !report_export(&exporter, result, visibility, &output.out) {
            code = 1;
        }
    }
    Ok(code)
}

/// Runs one PDF export and prints the outcome. A failure also writes the HTML
/// report so the manual print route is one step away.
fn report_export(
    exporter: &ReportExporter,
    result: &AnalysisResult,
    visibility: &mut AnswerVisibility,
    out: &Path,
) -> bool {
    println!("Generating A4 PDF...");
    match exporter.export(result, visibility, out) {
        ExportOutcome::Saved { path, pages } => {
            let plural = if pages == 1 { "" } else { "s" };
            println!("Saved {} ({pages} page{plural})", path.display());
            true
        }
        ExportOutcome::Failed { error, warning } => {
            eprintln!("PDF export failed: {error}");
            eprintln!("{warning}");
            match write_html_report(result, visibility, out) {
                Ok(path) => eprintln!("HTML report: {}", path.display()),
                Err(err) => eprintln!("poetique warning: {err:#}"),
            }
            false
        }
    }
}

fn write_result_json(result: &AnalysisResult, out: &Path) -> Result<PathBuf> {
    let path = out.join(RESULT_FILE_NAME);
    let body = serde_json::to_string_pretty(result)?;
    fs::write(&path, body).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

fn write_html_report(
    result: &AnalysisResult,
    visibility: &AnswerVisibility,
    out: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(out).with_context(|| format!("failed creating {}", out.display()))?;
    let path = out.join(report_file_name(&result.title)).with_extension("html");
    let html = ReportDocument::build(result, visibility, false).to_html();
    fs::write(&path, html).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

/// `"1, 3"` -> `[0, 2]`.
fn parse_show_answers(raw: Option<&str>) -> Result<Vec<usize>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let number: usize = part
            .parse()
            .with_context(|| format!("invalid question number `{part}`"))?;
        if number == 0 {
            bail!("question numbers start at 1");
        }
        if !out.contains(&(number - 1)) {
            out.push(number - 1);
        }
    }
    Ok(out)
}

type Outcome = (RequestToken, Result<AnalysisResult, AnalysisError>);

fn run_session(args: SessionArgs) -> Result<()> {
    let out_dir = args.output.out.clone();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed creating {}", out_dir.display()))?;
    let events = event_writer(&out_dir, args.events.clone());
    let client: Arc<dyn AnalysisClient> = Arc::new(build_client(args.model.clone()));
    let exporter = ReportExporter::with_glyph_rasterizer(export_options(&args.output), events.clone());
    let mut controller = SessionController::new(events);
    let (tx, rx) = mpsc::channel::<Outcome>();

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Poetique session started. Drop a poem photo path or type /help.");

    loop {
        drain_outcomes(&mut controller, &rx);
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        // A late result is applied before the command acts on the state.
        drain_outcomes(&mut controller, &rx);

        match intent.action.as_str() {
            "noop" => {}
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Any other line is treated as an image path.");
            }
            "upload" => {
                let Some(path) = intent.path().map(PathBuf::from) else {
                    println!("/upload requires a path");
                    continue;
                };
                start_upload(&mut controller, &client, &tx, &path);
            }
            "wait" => {
                if controller.in_flight().is_none() {
                    println!("Nothing in flight ({}).", controller.status());
                    continue;
                }
                while controller.in_flight().is_some() {
                    let Ok(outcome) = rx.recv() else {
                        break;
                    };
                    apply_outcome(&mut controller, outcome);
                }
            }
            "show" => print_view(&controller),
            "status" => print_status(&controller),
            "toggle_answer" => {
                let Some(number) = intent
                    .command_args
                    .get("question")
                    .and_then(Value::as_u64)
                else {
                    println!("/toggle requires a question number (1, 2, ...)");
                    continue;
                };
                match controller.toggle_answer(number as usize - 1) {
                    Ok(true) => println!("Question {number}: model answer shown."),
                    Ok(false) => println!("Question {number}: model answer hidden."),
                    Err(err) => println!("Toggle failed: {err}"),
                }
            }
            "export" => {
                let format = intent
                    .command_args
                    .get("format")
                    .and_then(Value::as_str)
                    .unwrap_or("pdf")
                    .to_string();
                let Some((result, visibility)) = controller.completed_mut() else {
                    println!("Nothing to export yet; upload a poem first.");
                    continue;
                };
                if format == "html" {
                    match write_html_report(result, visibility, &out_dir) {
                        Ok(path) => println!("HTML report: {}", path.display()),
                        Err(err) => println!("HTML export failed: {err:#}"),
                    }
                } else {
                    report_export(&exporter, result, visibility, &out_dir);
                }
            }
            "reset" => {
                controller.reset();
                println!("Session cleared.");
            }
            "quit" => break,
            _ => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help.");
            }
        }
    }

    Ok(())
}

fn start_upload(
    controller: &mut SessionController,
    client: &Arc<dyn AnalysisClient>,
    tx: &mpsc::Sender<Outcome>,
    path: &Path,
) {
    let preview = ImagePreview::load(path).ok();
    match &preview {
        Some(preview) => println!("Analyzing {}...", preview.describe()),
        None => println!("Analyzing {}...", path.display()),
    }
    let token = controller.begin_upload(preview);
    let image = match load_payload(path) {
        Ok(image) => image,
        Err(error) => {
            apply_outcome(controller, (token, Err(error)));
            return;
        }
    };
    controller.record_request(token, &image, client.name());

    let client = Arc::clone(client);
    let tx = tx.clone();
    thread::spawn(move || {
        let outcome = analyze_unwinding(client.as_ref(), &image);
        // The receiver only goes away when the session is over.
        let _ = tx.send((token, outcome));
    });
}

/// A panicking client still yields an outcome, so `/wait` always wakes up.
fn analyze_unwinding(
    client: &dyn AnalysisClient,
    image: &ImagePayload,
) -> Result<AnalysisResult, AnalysisError> {
    panic::catch_unwind(AssertUnwindSafe(|| client.analyze(image))).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|text| text.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(AnalysisError::transport(format!(
            "{} worker panicked: {detail}",
            client.name()
        )))
    })
}

fn drain_outcomes(controller: &mut SessionController, rx: &mpsc::Receiver<Outcome>) {
    while let Ok(outcome) = rx.try_recv() {
        apply_outcome(controller, outcome);
    }
}

fn apply_outcome(controller: &mut SessionController, (token, outcome): Outcome) {
    if controller.resolve(token, outcome) == Resolution::Stale {
        return;
    }
    print_view(controller);
}

fn print_status(controller: &SessionController) {
    let preview = controller
        .preview()
        .map(ImagePreview::describe)
        .unwrap_or_else(|| "no image".to_string());
    match controller.result() {
        Some(result) => println!(
            "Status: {} | {preview} | \"{}\" by {} | {} ({})",
            controller.status(),
            result.title,
            result.author,
            result.score_label(),
            result.cie_evaluation.grade
        ),
        None => println!("Status: {} | {preview}", controller.status()),
    }
}

fn print_view(controller: &SessionController) {
    match (controller.result(), controller.visibility()) {
        (Some(result), Some(visibility)) => {
            println!();
            print!(
                "{}",
                ReportDocument::build(result, visibility, false).to_plain_text()
            );
            println!("\nUse /toggle <n> to show a model answer, /export to save an A4 PDF.");
        }
        _ => match controller.error_message() {
            Some(message) => println!("Analysis failed: {message}"),
            None => print_status(controller),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use poetique_contracts::events::EventWriter;
    use poetique_contracts::{AnalysisResult, AnswerVisibility};
    use poetique_engine::{
        AnalysisClient, AnalysisError, AnalysisErrorKind, ImagePayload, SessionController,
    };
    use serde_json::json;

    use super::{
        analyze_unwinding, parse_show_answers, save_then_reveal, write_html_report,
        write_result_json, RESULT_FILE_NAME,
    };

    struct PanickingClient;

    impl AnalysisClient for PanickingClient {
        fn name(&self) -> &str {
            "panicking"
        }

        fn analyze(&self, _image: &ImagePayload) -> Result<AnalysisResult, AnalysisError> {
            panic!("connection pool poisoned");
        }
    }

    fn sample() -> AnalysisResult {
        let value = json!({
            "title": "Still I Rise",
            "author": "Maya Angelou",
            "ocrContent": "You may write me down in history\nWith your bitter, twisted lies,",
            "meaning": {"explicit": "A defiant address.", "implicit": "Resilience against oppression."},
            "tone": {"description": "Defiant.", "effects": "Empowering."},
            "structure": "Quatrains then a refrain.",
            "context": "Published 1978.",
            "personalResponse": "Uplifting.",
            "literaryDevices": [{"device": "Simile", "example": "like dust", "effect": "Irrepressible rise."}],
            "examQuestions": [
                {"question": "How does Angelou convey defiance?", "marks": 25, "modelAnswer": "Through rhetorical questions...", "keyPoints": ["questions"]}
            ],
            "cieEvaluation": {"ao1": "a", "ao2": "b", "ao3": "c", "ao4": "d", "totalMark": 21, "maxMark": 25, "grade": "A*", "examinerComments": "Excellent."}
        });
        AnalysisResult::from_json_str(&value.to_string()).unwrap()
    }

    #[test]
    fn show_answers_are_one_based_and_deduplicated() -> anyhow::Result<()> {
        assert_eq!(parse_show_answers(None)?, Vec::<usize>::new());
        assert_eq!(parse_show_answers(Some("1, 3,3"))?, vec![0, 2]);
        assert!(parse_show_answers(Some("0")).is_err());
        assert!(parse_show_answers(Some("two")).is_err());
        Ok(())
    }

    #[test]
    fn saved_result_can_be_rendered_again() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let result = sample();
        let path = write_result_json(&result, temp.path())?;
        let reloaded = AnalysisResult::from_json_str(&fs::read_to_string(path)?)?;
        assert_eq!(reloaded, result);
        Ok(())
    }

    #[test]
    fn html_report_is_named_after_the_title() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = write_html_report(&sample(), &AnswerVisibility::new(), temp.path())?;
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("CIE_Literature_Report_Still_I_Rise.html")
        );
        let html = fs::read_to_string(&path)?;
        assert!(html.contains("SCORE: 21 / 25"));
        assert!(html.contains("View Model Answer"));
        Ok(())
    }

    #[test]
    fn unknown_show_answer_numbers_do_not_lose_the_analysis() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = SessionController::new(EventWriter::disabled("cli-test"));
        let token = controller.begin_upload(None);
        controller.resolve(token, Ok(sample()));

        let saved = save_then_reveal(&mut controller, &[1, 0], temp.path())?;
        assert_eq!(saved, temp.path().join(RESULT_FILE_NAME));
        assert_eq!(AnalysisResult::from_json_str(&fs::read_to_string(&saved)?)?, sample());
        let visibility = controller.visibility().expect("completed");
        assert_eq!(visibility.visible_indices(), vec![0]);
        Ok(())
    }

    #[test]
    fn panicking_client_becomes_a_transport_error() -> anyhow::Result<()> {
        let image = ImagePayload::from_bytes(b"not really a png", "image/png")?;
        let err = analyze_unwinding(&PanickingClient, &image).unwrap_err();
        assert_eq!(err.kind(), AnalysisErrorKind::Transport);
        assert!(err.message().contains("connection pool poisoned"));
        Ok(())
    }
}
