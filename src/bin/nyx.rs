//! nyx: query DSL to SQL
//!
//! # Usage
//!
//! ```bash
//! # Show the generated SQL (and run it when a database URL is set)
//! nyx "get('users','name').where('age','>','18').limit(5)"
//!
//! # Dry run against a configured database
//! nyx "delete('sessions').where('id','<',100)" --dry-run
//!
//! # Interactive session
//! nyx repl
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use nyx::lexer;
use nyx::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nyx")]
#[command(version)]
#[command(about = "Compile fluent query DSL into SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    nyx \"getAll('users')\"
    nyx \"get('users','name').where('age','>','18').limit('5')\" --dialect sqlite
    nyx \"insert('users').values('name','Ann','age',31)\" --database-url mysql://root@localhost/app")]
struct Cli {
    /// The statement to compile
    query: Option<String>,

    /// Don't execute, just show the generated SQL
    #[arg(short, long)]
    dry_run: bool,

    /// Output format for result rows
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Database connection URL
    #[arg(long, env = "NYX_DATABASE_URL")]
    database_url: Option<String>,

    /// SQL dialect when not connected (mysql, sqlite)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Config file (default: ./nyx.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, analyze and explain a statement
    Explain {
        /// The statement to explain
        query: String,
    },
    /// Show the token stream of a statement
    Tokens {
        /// The statement to tokenize
        query: String,
    },
    /// Interactive REPL mode
    Repl,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { query }) => explain_query(query, &cli),
        Some(Commands::Tokens { query }) => {
            show_tokens(query);
            Ok(())
        }
        Some(Commands::Repl) => run_repl(&cli).await,
        None => match &cli.query {
            Some(query) => execute_query(query, &cli).await,
            None => {
                println!("{}", "nyx: fluent query DSL to SQL".cyan().bold());
                println!();
                println!("Usage: nyx <QUERY> [OPTIONS]");
                println!();
                println!("Try: nyx --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "nyx=debug" } else { "nyx=warn" };
    let filter = EnvFilter::try_from_env("NYX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }
    Ok(config)
}

/// Connected session unless `offline`, in which case the URL only picks
/// the dialect.
async fn open_session(config: &Config, offline: bool, verbose: bool) -> anyhow::Result<Session> {
    if let (false, Some(url)) = (offline, &config.database_url) {
        if verbose {
            println!("{} {}", "Connecting to:".dimmed(), url);
        }
        return Session::from_config(config).await.map_err(Into::into);
    }

    let dialect = config
        .database_url
        .as_deref()
        .and_then(Dialect::from_url)
        .unwrap_or(config.dialect);
    let offline = Config {
        database_url: None,
        dialect,
        schema: config.schema.clone(),
    };
    Ok(Session::from_config(&offline).await?)
}

async fn execute_query(query: &str, cli: &Cli) -> anyhow::Result<()> {
    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), query.yellow());
    }

    let config = load_config(cli)?;
    let mut session = open_session(&config, cli.dry_run, cli.verbose).await?;
    let connected = session.backend().is_some();

    run_statement(&mut session, query, cli.format, connected).await?;

    if config.database_url.is_none() && !cli.dry_run {
        println!();
        println!(
            "{}",
            "⚠ No database URL. Use --database-url or set NYX_DATABASE_URL".yellow()
        );
    }
    Ok(())
}

/// Parse, analyze, compile and (when `execute`) run one statement.
async fn run_statement(
    session: &mut Session,
    query: &str,
    format: OutputFormat,
    execute: bool,
) -> anyhow::Result<()> {
    let stmt = session.parse(query)?;
    let valid = session.analyze(&stmt);
    print_warnings(session.warnings());
    if !valid {
        for err in session.errors() {
            eprintln!("  {} {}", "✗".red(), err.red());
        }
        bail!("statement rejected by semantic analysis");
    }

    let sql = session.compile(&stmt)?;
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", sql.white());

    if !execute {
        return Ok(());
    }

    println!();
    let outcome = session.execute(&stmt).await?;
    print_outcome(&outcome, format);
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        println!("  {} {}", "⚠".yellow(), w.yellow());
    }
}

fn print_outcome(outcome: &QueryOutcome, format: OutputFormat) {
    match outcome {
        QueryOutcome::Rows(rows) => format_output(rows, format),
        QueryOutcome::Inserted { id, values } => {
            match id {
                Some(id) => println!("{} Inserted row {}", "✓".green(), id.to_string().cyan()),
                None => println!("{} Inserted row", "✓".green()),
            }
            for (col, val) in values {
                println!("    {} = {}", col.white(), val.to_string().yellow());
            }
        }
        QueryOutcome::Status { success: true, message } => {
            println!("{} {}", "✓".green(), message);
        }
        QueryOutcome::Status { success: false, message } => {
            println!("{} {}", "✗".red(), message.red());
        }
        QueryOutcome::Affected(n) => {
            println!("{} {} rows affected", "✓".green(), n);
        }
    }
}

fn format_output(results: &[Row], format: OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = results[0].keys().collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
            for row in results {
                for (i, col) in columns.iter().enumerate() {
                    let len = row.get(*col).map(val_to_string).unwrap_or_default().chars().count();
                    widths[i] = widths[i].max(len);
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| {
                        let val = row.get(*c).map(val_to_string).unwrap_or_default();
                        format!("{:width$}", val, width = *w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn explain_query(query: &str, cli: &Cli) -> anyhow::Result<()> {
    println!("{}", "nyx Statement Explanation".cyan().bold());
    println!();
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();

    let config = load_config(cli)?;
    let mut schema = Schema::new();
    for (table, columns) in &config.schema {
        schema.register(table.as_str(), columns.iter().map(String::as_str));
    }

    let stmt = nyx::parse(query)?;
    println!("{}", "Parsed Structure:".green().bold());
    println!("  {} {}", "Kind:".dimmed(), stmt.kind().cyan());
    println!("  {} {}", "Table:".dimmed(), stmt.table_name().white());

    match &stmt {
        Statement::CreateDatabase(_) => {}
        Statement::CreateTable(node) => {
            println!("  {}", "Columns:".dimmed());
            for col in &node.columns {
                let mut line = format!("{} {}", col.name, col.data_type);
                if let Some(size) = col.size {
                    line.push_str(&format!("({})", size));
                }
                for c in &col.constraints {
                    line.push_str(&format!(" {:?}", c));
                }
                println!("    • {}", line.white());
            }
        }
        Statement::Insert(node) => {
            println!("  {}", "Values:".dimmed());
            for (col, val) in &node.values {
                println!("    • {} = {}", col.white(), val.to_string().yellow());
            }
        }
        Statement::Select(node) => {
            println!("  {} {}", "Columns:".dimmed(), node.columns.to_string().white());
            print_chain(node.filter.as_ref(), node.limit);
        }
        Statement::Delete(node) => print_chain(node.filter.as_ref(), node.limit),
    }

    let mut analyzer = Analyzer::new();
    let valid = analyzer.analyze(&stmt, &mut schema);
    println!();
    println!("{}", "Analysis:".green().bold());
    if valid {
        println!("  {} valid", "✓".green());
    }
    for err in analyzer.errors() {
        println!("  {} {}", "✗".red(), err.red());
    }
    print_warnings(analyzer.warnings());

    let dialect = cli.dialect.unwrap_or(config.dialect);
    println!();
    println!("{} {}", "Generated SQL".green().bold(), format!("({})", dialect).dimmed());
    match Compiler::new(dialect).with_catalog(&schema).compile(&stmt) {
        Ok(sql) => println!("  {}", sql.white()),
        Err(e) => println!("  {} {}", "✗".red(), e.to_string().red()),
    }
    Ok(())
}

fn print_chain(filter: Option<&Condition>, limit: Option<i64>) {
    if let Some(cond) = filter {
        let value = cond.value.as_ref().map(Value::to_string).unwrap_or_else(|| "?".into());
        println!(
            "  {} {} {} {}",
            "Where:".dimmed(),
            cond.column.white(),
            cond.op.cyan(),
            value.yellow()
        );
    }
    if let Some(n) = limit {
        println!("  {} {}", "Limit:".dimmed(), n.to_string().yellow());
    }
}

fn show_tokens(query: &str) {
    let (tokens, errors) = lexer::scan(query);

    println!(
        "{:>4}:{:<4} {}",
        "Line".white().bold(),
        "Col".white().bold(),
        "Token".white().bold()
    );
    println!("{}", "─".repeat(40).dimmed());
    for tok in &tokens {
        println!(
            "{:>4}:{:<4} {}",
            tok.position.line,
            tok.position.column,
            tok.kind.describe().cyan()
        );
    }
    for err in &errors {
        eprintln!("{} {}", "✗".red(), err.to_string().red());
    }
}

async fn run_repl(cli: &Cli) -> anyhow::Result<()> {
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    let config = load_config(cli)?;
    let mut session = open_session(&config, cli.dry_run, cli.verbose).await?;
    let connected = session.backend().is_some();

    println!("{}", "nyx REPL (interactive mode)".cyan().bold());
    println!("{}", "One session: tables you create or touch stay known.".dimmed());
    show_repl_help();

    let mut rl = DefaultEditor::new().context("initializing line editor")?;

    let history_path = dirs::home_dir()
        .map(|p| p.join(".nyx_history"))
        .unwrap_or_default();
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = "nyx> ".cyan().bold().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ".exit" | ".quit" | "exit" | "quit" => {
                        println!("{}", "Goodbye!".green());
                        break;
                    }
                    ".help" | "help" => {
                        show_repl_help();
                        continue;
                    }
                    ".clear" | "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    ".schema" => {
                        show_schema(session.schema());
                        continue;
                    }
                    ".sql" => {
                        println!("{}", session.last_sql().unwrap_or("(none)").white());
                        continue;
                    }
                    _ => {}
                }

                if let Err(e) = run_statement(&mut session, line, cli.format, connected).await {
                    eprintln!("{} {}", "✗".red(), format!("{:#}", e).red());
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".green());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn show_schema(schema: &Schema) {
    let mut empty = true;
    for table in schema.tables() {
        empty = false;
        let cols = schema
            .table(table)
            .unwrap_or_default()
            .iter()
            .map(|c| match c.data_type {
                Some(ty) => format!("{} {}", c.name, ty),
                None => c.name.clone(),
            })
            .collect::<Vec<_>>();
        println!("  {} ({})", table.cyan(), cols.join(", "));
    }
    if empty {
        println!("{}", "(no tables)".dimmed());
    }
}

fn show_repl_help() {
    println!("{}", "REPL Commands:".cyan().bold());
    println!("  {}    - Exit the REPL", ".exit".yellow());
    println!("  {}    - Show this help", ".help".yellow());
    println!("  {}   - Clear screen", ".clear".yellow());
    println!("  {}  - Show known tables", ".schema".yellow());
    println!("  {}     - Show the last generated SQL", ".sql".yellow());
    println!();
    println!("{}", "Examples:".cyan().bold());
    println!("  createTable('users').column('id','int','primarykey','autoincrement').column('name','varchar',100)");
    println!("  insert('users').values('name','Ann')");
    println!("  get('users','id','name').where('name','like','A%').limit(10)");
    println!("  delete('users').where('id','=',1)");
    println!();
}
