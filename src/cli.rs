use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Parser, Subcommand};
use phonetic_worksheet::dictionary::{DEFAULT_SYMBOLS_PATH, DEFAULT_WORDS_PATH};
use phonetic_worksheet::selection::{DEFAULT_WORD_COUNT, MAX_WORD_COUNT};
use phonetic_worksheet::{
    Dictionary, DictionaryConfig, DictionaryRow, EXPORT_FILENAME, Export, Rating, SelectedSymbol,
    SelectionMode, WordCount, Worksheet, WorksheetError, filter_by_symbol, select_words,
};
use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "phonetic-worksheet",
    about = "Draw random words from a phonetic dictionary and rate them",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Word list CSV (`word,symbols,...`, no header).
    #[arg(long, global = true, default_value = DEFAULT_WORDS_PATH)]
    words: PathBuf,

    /// Symbol list CSV (`symbol,...`, no header).
    #[arg(long, global = true, default_value = DEFAULT_SYMBOLS_PATH)]
    symbols: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the phonetic symbols usable as filters.
    Symbols,
    /// Print one random selection of words.
    Sample {
        /// Only draw words whose pronunciation contains this symbol.
        #[arg(short, long)]
        symbol: Option<String>,
        /// How many words to draw.
        #[arg(short, long, default_value_t = DEFAULT_WORD_COUNT)]
        count: usize,
        /// Seed the shuffle for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write a ratings PDF for the given words.
    Export {
        /// Dictionary words to place on the worksheet, in order.
        #[arg(required = true, value_name = "WORD")]
        entries: Vec<String>,
        /// Rating assignments such as `cat=4`.
        #[arg(short, long = "rate", value_name = "WORD=N")]
        ratings: Vec<String>,
        /// Destination of the PDF.
        #[arg(short, long, default_value = EXPORT_FILENAME)]
        output: PathBuf,
    },
    /// Build and rate a worksheet interactively on stdin.
    Session {
        /// Destination of the PDF written by `submit`.
        #[arg(short, long, default_value = EXPORT_FILENAME)]
        output: PathBuf,
        /// Seed the shuffle for reproducible sessions.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Serve the worksheet over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page styling.
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
    },
}

#[cfg(feature = "web")]
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for phonetic_worksheet::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => Self::Tailwind,
            ThemeArg::Bootstrap => Self::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = DictionaryConfig {
        words_path: cli.words.clone(),
        symbols_path: cli.symbols.clone(),
    };
    match cli.command {
        Command::Symbols => {
            init_tracing("warn");
            handle_symbols(&Dictionary::load(&config)?, cli.json)
        }
        Command::Sample {
            symbol,
            count,
            seed,
        } => {
            init_tracing("warn");
            handle_sample(&Dictionary::load(&config)?, symbol, count, seed, cli.json)
        }
        Command::Export {
            entries,
            ratings,
            output,
        } => {
            init_tracing("warn");
            handle_export(&Dictionary::load(&config)?, entries, ratings, &output, cli.json)
        }
        Command::Session { output, seed } => {
            init_tracing("warn");
            handle_session(&Dictionary::load(&config)?, &output, seed)
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => {
            init_tracing("info");
            let web_config = phonetic_worksheet::web::WebConfig {
                addr,
                theme: theme.into(),
                dictionary: config,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(phonetic_worksheet::web::serve(web_config))?;
            Ok(())
        }
    }
}

fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn shuffle_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

fn handle_symbols(dictionary: &Dictionary, as_json: bool) -> Result<(), Box<dyn Error>> {
    let symbols = dictionary.symbols();
    if as_json {
        let payload: Vec<_> = symbols
            .iter()
            .map(|row| json!({ "symbol": row.symbol(), "description": row.description() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if symbols.is_empty() {
        println!("No symbols loaded.");
        return Ok(());
    }
    let width = symbols
        .iter()
        .map(|row| row.symbol().len())
        .max()
        .unwrap_or(6)
        .max("SYMBOL".len());
    println!("{:<width$}  {}", "SYMBOL", "DESCRIPTION", width = width);
    println!("{:-<width$}  {}", "", "-----------", width = width);
    for row in symbols {
        println!(
            "{:<width$}  {}",
            row.symbol(),
            row.description().unwrap_or_default(),
            width = width
        );
    }
    Ok(())
}

fn handle_sample(
    dictionary: &Dictionary,
    symbol: Option<String>,
    count: usize,
    seed: Option<u64>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let symbol = SelectedSymbol::from(symbol);
    let count = WordCount::new(count).ok_or_else(|| {
        format!("Word count must be between 1 and {MAX_WORD_COUNT}, got {count}")
    })?;
    let mut rng = shuffle_rng(seed);
    let picked = select_words(dictionary.words(), &symbol, count, &mut rng);

    if as_json {
        let payload = json!({
            "symbol": symbol.as_filter(),
            "count": count.get(),
            "results": picked.iter().map(|row| {
                json!({ "word": row.word(), "symbols": row.symbols() })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_rows(&picked);
    }
    Ok(())
}

fn handle_export(
    dictionary: &Dictionary,
    entries: Vec<String>,
    ratings: Vec<String>,
    output: &Path,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut worksheet = rated_worksheet(dictionary, &entries, &ratings)?;
    let export = worksheet.export();
    write_export(&export, output)?;

    if as_json {
        let payload = json!({
            "output": output.display().to_string(),
            "lines": export.text.lines().collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", export.text);
        println!("\nWrote {}", output.display());
    }
    Ok(())
}

/// Worksheet holding `entries` in order with every `WORD=N` rating applied.
fn rated_worksheet(
    dictionary: &Dictionary,
    entries: &[String],
    ratings: &[String],
) -> Result<Worksheet, Box<dyn Error>> {
    let mut worksheet = Worksheet::new();
    for word in entries {
        let row = dictionary
            .get(word)
            .ok_or_else(|| WorksheetError::UnknownWord(word.clone()))?;
        worksheet.push_row(row.clone());
    }
    for assignment in ratings {
        let (word, rating) = parse_rating_assignment(assignment)?;
        worksheet.set_rating(&word, Some(rating));
    }
    Ok(worksheet)
}

fn parse_rating_assignment(raw: &str) -> Result<(String, Rating), Box<dyn Error>> {
    let (word, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected WORD=N, got {raw:?}"))?;
    let word = word.trim();
    if word.is_empty() {
        return Err(format!("Missing word in rating {raw:?}").into());
    }
    Ok((word.to_string(), value.parse::<Rating>()?))
}

fn write_export(export: &Export, output: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &export.pdf)?;
    info!(path = %output.display(), bytes = export.pdf.len(), "worksheet exported");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Add,
    Symbol(Option<String>),
    Count(WordCount),
    Rate { word: String, rating: Option<Rating> },
    Delete(String),
    Clear,
    List,
    Submit,
    Help,
    Quit,
}

const SESSION_HELP: &str = "\
Commands:
  add              draw words with the current filter and count
  symbol [S]       set the symbol filter (omit S for no filter)
  count N          set how many words `add` draws
  rate WORD N      rate a word 1-5 (use `-` to clear)
  delete WORD      remove a word and its rating
  clear            remove every word and rating
  list             show the worksheet
  submit           write the PDF and start over
  quit             leave without exporting";

fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();
    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("add", []) => SessionCommand::Add,
        ("symbol", []) => SessionCommand::Symbol(None),
        ("symbol", [symbol]) => SessionCommand::Symbol(Some(symbol.to_string())),
        ("count", [count]) => {
            let count = count
                .parse::<usize>()
                .ok()
                .and_then(WordCount::new)
                .ok_or_else(|| {
                    format!("count must be between 1 and {MAX_WORD_COUNT}, got {count:?}")
                })?;
            SessionCommand::Count(count)
        }
        ("rate", [word, "-"]) => SessionCommand::Rate {
            word: word.to_string(),
            rating: None,
        },
        ("rate", [word, value]) => SessionCommand::Rate {
            word: word.to_string(),
            rating: Some(value.parse::<Rating>().map_err(|err| err.to_string())?),
        },
        ("delete", [word]) => SessionCommand::Delete(word.to_string()),
        ("clear", []) => SessionCommand::Clear,
        ("list", []) => SessionCommand::List,
        ("submit", []) => SessionCommand::Submit,
        ("help", _) | ("?", _) => SessionCommand::Help,
        ("quit", []) | ("exit", []) => SessionCommand::Quit,
        _ => return Err(format!("unrecognised command {line:?}; type `help`")),
    };
    Ok(Some(command))
}

fn handle_session(
    dictionary: &Dictionary,
    output: &Path,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let mut rng = shuffle_rng(seed);
    let mut worksheet = Worksheet::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!(
        "Phonetic worksheet: {} words, {} symbols. Type `help` for commands.",
        dictionary.words().len(),
        dictionary.symbols().len()
    );

    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        stdout.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let command = match parse_command(&line?) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == SessionCommand::Quit {
            break;
        }
        let reply = apply_command(&mut worksheet, dictionary, command, &mut rng, output)?;
        if let Some(message) = reply.message {
            println!("{message}");
        }
        if reply.show_worksheet {
            print_worksheet(&worksheet);
        }
    }
    Ok(())
}

/// What the session loop prints after a command.
#[derive(Debug, Default, PartialEq, Eq)]
struct SessionReply {
    message: Option<String>,
    show_worksheet: bool,
}

impl SessionReply {
    fn say(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            show_worksheet: false,
        }
    }
}

fn apply_command<R: Rng + ?Sized>(
    worksheet: &mut Worksheet,
    dictionary: &Dictionary,
    command: SessionCommand,
    rng: &mut R,
    output: &Path,
) -> Result<SessionReply, Box<dyn Error>> {
    let reply = match command {
        SessionCommand::Add => {
            let added = worksheet.add_words(dictionary, SelectionMode::Append, rng);
            SessionReply {
                message: Some(format!("Added {added} word{}.", if added == 1 { "" } else { "s" })),
                show_worksheet: true,
            }
        }
        SessionCommand::Symbol(symbol) => {
            if let Some(symbol) = symbol.as_deref() {
                let known = dictionary.symbols().is_empty()
                    || dictionary.symbols().iter().any(|row| row.symbol() == symbol);
                if !known {
                    return Ok(SessionReply::say(format!(
                        "Unknown symbol {symbol:?}; see the `symbols` subcommand."
                    )));
                }
            }
            worksheet.set_selected_symbol(SelectedSymbol::from(symbol));
            let matching = filter_by_symbol(dictionary.words(), worksheet.selected_symbol());
            SessionReply::say(format!("{} words match.", matching.len()))
        }
        SessionCommand::Count(count) => {
            worksheet.set_word_count(count);
            SessionReply::say(format!("Drawing {count} words per add."))
        }
        SessionCommand::Rate { word, rating } => {
            worksheet.set_rating(&word, rating);
            SessionReply::default()
        }
        SessionCommand::Delete(word) => {
            if worksheet.delete_word(&word) {
                SessionReply::default()
            } else {
                SessionReply::say(format!("{word:?} is not on the worksheet."))
            }
        }
        SessionCommand::Clear => {
            worksheet.delete_all();
            SessionReply::default()
        }
        SessionCommand::List => SessionReply {
            message: None,
            show_worksheet: true,
        },
        SessionCommand::Submit => {
            let export = worksheet.export();
            write_export(&export, output)?;
            SessionReply::say(format!(
                "Wrote {} line(s) to {}.",
                export.text.lines().count(),
                output.display()
            ))
        }
        SessionCommand::Help => SessionReply::say(SESSION_HELP),
        SessionCommand::Quit => SessionReply::default(),
    };
    Ok(reply)
}

fn print_rows(rows: &[DictionaryRow]) {
    if rows.is_empty() {
        println!("No words matched.");
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.word().len())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {}", "WORD", "SYMBOLS", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for row in rows {
        println!(
            "{:<width$}  {}",
            row.word(),
            row.symbols().unwrap_or_default(),
            width = width
        );
    }
}

fn worksheet_markdown(worksheet: &Worksheet) -> String {
    let mut table = String::from("|Word|Symbols|Rating|\n|:-|:-|:-:|\n");
    for row in worksheet.displayed() {
        let rating = worksheet
            .rating(row.word())
            .map(|rating| rating.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.push_str(&format!(
            "|{}|{}|{}|\n",
            row.word(),
            row.symbols().unwrap_or_default(),
            rating
        ));
    }
    table
}

fn print_worksheet(worksheet: &Worksheet) {
    if worksheet.is_empty() {
        println!("The worksheet is empty.");
        return;
    }
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let markdown = worksheet_markdown(worksheet);
        let formatted = FmtText::from(&skin, &markdown, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{}", worksheet.export_text());
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}
