use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use study_client::api::{ContentForm, UploadFile};
use study_client::clients::HttpTransport;
use study_client::config::ClientConfig;
use study_client::core::ApiClient;
use study_client::mindmap::{
    render_with_fallback, ElementsRenderer, GraphRenderer, MindmapView, OutlineRenderer,
};
use study_client::notes::NotesFormat;
use study_client::quiz::{AnswerInput, QuestionBody, QuizOptions, MATCHING_PAIRS};
use study_client::store::StudyStore;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum MindmapFormat {
    Elements,
    Outline,
}

#[derive(Parser)]
#[command(author, version, about = "Study assistant client", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    STUDY_API_BASE_URL           Backend base URL [default: http://127.0.0.1:5000]
    STUDY_TIMEOUT_PROCESS_SECS   Content processing timeout [default: 300]
    STUDY_TIMEOUT_GENERATE_SECS  Quiz/flashcard/mind map timeout [default: 180]
    STUDY_TIMEOUT_DEFAULT_SECS   Timeout for everything else [default: 60]
    STUDY_MAX_RETRIES            Connectivity retries [default: 3]
    RUST_LOG                     Log filter [default: info]

EXAMPLES:
    study mindmap --file map.mmd --format outline
    study process --topic Cells --description \"Mitosis basics\" --export md
    study quiz --url https://example.com/article --types MCQ --types Short_Answer
    study chat --topic Cells --description \"Mitosis basics\" \"What is prophase?\"")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and render mind map syntax offline
    Mindmap {
        /// File with the syntax, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, value_enum)]
        format: Option<MindmapFormat>,
    },
    /// Process content and print the generated notes
    Process {
        #[command(flatten)]
        source: SourceArgs,
        /// Also write the notes to a file (md or txt)
        #[arg(long)]
        export: Option<NotesFormat>,
    },
    /// Process content, generate a quiz and answer it on the terminal
    Quiz {
        #[command(flatten)]
        source: SourceArgs,
        /// Question types to request (MCQ, True/False, Fill_in_the_Blank, Short_Answer, Matching)
        #[arg(long = "types", default_value = "MCQ")]
        types: Vec<String>,
        #[arg(short, long, default_value_t = 5)]
        num: u32,
        #[arg(long, default_value = "Apply")]
        difficulty: String,
    },
    /// Process content and print a generated flashcard deck
    Flashcards {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Process content and ask one chat question about it
    Chat {
        #[command(flatten)]
        source: SourceArgs,
        message: String,
    },
}

#[derive(Args)]
struct SourceArgs {
    #[arg(long = "url")]
    urls: Vec<String>,
    #[arg(long)]
    topic: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Files to upload
    #[arg(long = "upload")]
    files: Vec<PathBuf>,
    #[arg(long)]
    web_search: bool,
}

impl SourceArgs {
    fn into_form(self) -> Result<ContentForm> {
        let files = self
            .files
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                Ok(UploadFile { file_name, bytes, mime: None })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ContentForm {
            urls: self.urls,
            topic: self.topic.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            web_search: self.web_search,
            generate_quiz: false,
            generate_flashcards: false,
            generate_mindmap: false,
            files,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Mindmap { file, format } => run_mindmap(&file, format),
        Command::Process { source, export } => {
            let store = connect();
            let outcome = store.process_content(source.into_form()?).await?;
            print_warnings(&outcome.warnings);
            println!("# {}\n", outcome.title);
            println!("{}", store.with_state(|s| s.content.as_ref().map(|c| c.notes.clone()).unwrap_or_default()));
            if let Some(format) = export {
                let file = store.export_notes(format)?;
                std::fs::write(&file.file_name, &file.content)
                    .with_context(|| format!("writing {}", file.file_name))?;
                eprintln!("Notes saved to {}", file.file_name);
            }
            Ok(())
        }
        Command::Quiz { source, types, num, difficulty } => {
            let store = connect();
            let outcome = store.process_content(source.into_form()?).await?;
            print_warnings(&outcome.warnings);
            let options = QuizOptions { question_types: types, num_questions: num, difficulty };
            run_quiz(&store, options).await
        }
        Command::Flashcards { source } => {
            let store = connect();
            store.process_content(source.into_form()?).await?;
            store.generate_flashcards().await?;
            store.with_flashcards(|deck| loop {
                if let Some(card) = deck.current() {
                    println!("{}\n  Q: {}\n  A: {}", deck.counter(), card.question, card.answer);
                }
                if !deck.has_next() {
                    break;
                }
                deck.next();
            });
            Ok(())
        }
        Command::Chat { source, message } => {
            let store = connect();
            store.process_content(source.into_form()?).await?;
            println!("{}", store.send_chat(&message).await?);
            Ok(())
        }
    }
}

fn connect() -> StudyStore<HttpTransport> {
    let config = ClientConfig::from_env();
    let transport = HttpTransport::from_config(&config);
    StudyStore::new(ApiClient::with_config(transport, &config))
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

fn run_mindmap(file: &Path, format: Option<MindmapFormat>) -> Result<()> {
    let syntax = if file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?
    };

    let renderers: Vec<Box<dyn GraphRenderer>> = match format {
        Some(MindmapFormat::Elements) => vec![Box::new(ElementsRenderer)],
        Some(MindmapFormat::Outline) => vec![Box::new(OutlineRenderer::default())],
        None => study_client::mindmap::default_renderers(),
    };

    match render_with_fallback(&syntax, &renderers) {
        MindmapView::Rendered { output, .. } => print!("{}", output),
        MindmapView::Raw { syntax, error } => {
            eprintln!("Error rendering mind map: {}", error);
            println!("{}", syntax);
        }
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{} ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run_quiz(store: &StudyStore<HttpTransport>, options: QuizOptions) -> Result<()> {
    let set = store.generate_quiz(options).await?;
    if set.is_empty() {
        bail!("No valid questions were generated");
    }

    for (index, question) in set.questions().iter().enumerate() {
        println!("\n{}. [{}] {}", index + 1, question.label(), question.prompt);
        let input = match &question.body {
            QuestionBody::Mcq { options, .. } => {
                for (i, option) in options.iter().enumerate() {
                    println!("   {}) {}", i + 1, option);
                }
                let picked = prompt("Option number:")?;
                let choice = picked
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| options.get(n.wrapping_sub(1)))
                    .cloned()
                    .unwrap_or(picked);
                AnswerInput::Choice(choice)
            }
            QuestionBody::TrueFalse { .. } => AnswerInput::Choice(prompt("True or False:")?.trim().to_string()),
            QuestionBody::Matching { column_a, column_b, .. } => {
                for (i, item) in column_a.iter().enumerate() {
                    println!("   A{}: {}", i, item);
                }
                let mut selections = Vec::with_capacity(MATCHING_PAIRS);
                for item in column_b {
                    selections.push(prompt(&format!("   {} matches A#:", item))?.trim().to_string());
                }
                AnswerInput::Selections(selections)
            }
            _ => AnswerInput::Text(prompt("Answer:")?),
        };
        store.record_answer(index, input)?;
    }

    let report = store.submit_quiz().await?;
    for (index, result) in report.results.iter() {
        let mark = if result.correct == Some(true) { "correct" } else { "incorrect" };
        println!("\n{}. {}: {}", index + 1, mark, result.feedback);
    }
    println!("\n{}", report.summary());
    Ok(())
}
