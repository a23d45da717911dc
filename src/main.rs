use nu_ansi_term::{Color, Style};
use reedline::{DefaultPrompt, DefaultPromptSegment, Highlighter, Reedline, Signal, StyledText};
use statc::fixer::{self, FixOutput};
use statc::stream::render;
use statc::{
    AssignOp, BinaryOp, Capacities, CompareOp, CompileError, Condition, DeclaredType, Literal,
    LowerError, Operand, ScriptBuilder, Slot, StructuralError,
};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    init_logging();

    let capacities = match Capacities::from_env() {
        Ok(capacities) => capacities,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    // One-shot mode: `;`-separated commands from the command line
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let script = args.join(" ");
        if let Err(err) = run_script(&script, capacities) {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
        return;
    }

    run_repl(capacities);
}

/// `RUST_LOG` overrides the default `warn` filter. Logs go to stderr so program output stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("syntax: {0}")]
    Syntax(String),
    #[error(transparent)]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Structure(#[from] StructuralError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn syntax(message: impl Into<String>) -> CommandError {
    CommandError::Syntax(message.into())
}

fn run_script(script: &str, capacities: Capacities) -> Result<(), CommandError> {
    let mut builder = ScriptBuilder::new().with_capacities(capacities);
    for command in script.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        execute(&mut builder, command)?;
    }
    let output = builder.finalize()?;
    print!("{}", render(&output.instructions));
    report_warnings(&output);
    Ok(())
}

/// Runs one statement against the builder.
fn execute(builder: &mut ScriptBuilder, command: &str) -> Result<(), CommandError> {
    if let Some(text) = command.strip_prefix("//") {
        builder.comment(text.trim());
        return Ok(());
    }
    let tokens: Vec<&str> = command.split_whitespace().collect();
    match tokens.as_slice() {
        ["if", mode, rest @ ..] => {
            let conditions = parse_conditions(builder, rest)?;
            match *mode {
                "and" => builder.if_and(&conditions)?,
                "or" => builder.if_or(&conditions)?,
                other => return Err(syntax(format!("expected `and` or `or`, got `{other}`"))),
            }
        }
        ["else"] => builder.else_branch()?,
        ["end"] => builder.end()?,
        ["goto", name] => builder.goto(name)?,
        ["call", name] => builder.trigger_function(name),
        ["note", parts @ ..] => {
            let parts = parts
                .iter()
                .map(|part| parse_operand(builder, part))
                .collect::<Result<Vec<_>, _>>()?;
            builder.note(&parts);
        }
        ["exit"] => builder.exit_function(),
        ["cancel"] => builder.cancel_event(),
        ["fullheal"] => builder.full_heal(),
        ["maxhealth", amount] => {
            let amount = amount
                .parse()
                .map_err(|_| syntax(format!("`{amount}` is not an integer")))?;
            builder.max_health(amount);
        }
        [target, "=", rest @ ..] => {
            let target = parse_slot(builder, target)?;
            let value = parse_expression(builder, rest)?;
            builder.lower().assign(&target, &value)?;
        }
        [target, op, value] if op.ends_with('=') => {
            let target = parse_slot(builder, target)?;
            let op = match *op {
                "+=" => AssignOp::Add,
                "-=" => AssignOp::Sub,
                "*=" => AssignOp::Mul,
                "/=" => AssignOp::Div,
                "%=" => AssignOp::Mod,
                other => return Err(syntax(format!("unknown assignment operator `{other}`"))),
            };
            let value = parse_operand(builder, value)?;
            builder.lower().assign_op(&target, op, &value)?;
        }
        _ => return Err(syntax(format!("cannot parse `{command}`, see :help"))),
    }
    Ok(())
}

fn parse_expression(builder: &mut ScriptBuilder, tokens: &[&str]) -> Result<Operand, CommandError> {
    match tokens {
        [value] => parse_operand(builder, value),
        ["sign", value] => {
            let value = parse_operand(builder, value)?;
            Ok(builder.lower().sign(&value, 1, false)?)
        }
        ["abs", value] => {
            let value = parse_operand(builder, value)?;
            Ok(builder.lower().abs(&value, None)?)
        }
        [left, "**", exponent] => {
            let base = parse_operand(builder, left)?;
            let exponent = exponent
                .parse()
                .map_err(|_| syntax(format!("exponent `{exponent}` must be an integer")))?;
            Ok(builder.lower().pow(&base, exponent)?)
        }
        [left, op, right] => {
            let left = parse_operand(builder, left)?;
            let right = parse_operand(builder, right)?;
            let mut lower = builder.lower();
            let result = match *op {
                "+" => lower.binary(BinaryOp::Add, &left, &right)?,
                "-" => lower.binary(BinaryOp::Sub, &left, &right)?,
                "*" => lower.binary(BinaryOp::Mul, &left, &right)?,
                "/" => lower.binary(BinaryOp::Div, &left, &right)?,
                "//" => lower.floordiv(&left, &right)?,
                "%" => lower.modulo(&left, &right)?,
                other => return Err(syntax(format!("unknown operator `{other}`"))),
            };
            Ok(result)
        }
        _ => Err(syntax("expected `<a>`, `<a> <op> <b>`, `sign <a>` or `abs <a>`")),
    }
}

/// `a > 1, b == 2`: conditions separated by commas.
fn parse_conditions(
    builder: &mut ScriptBuilder,
    tokens: &[&str],
) -> Result<Vec<Condition>, CommandError> {
    let joined = tokens.join(" ");
    let mut conditions = Vec::new();
    for part in joined.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let words: Vec<&str> = part.split_whitespace().collect();
        let [left, symbol, right] = words.as_slice() else {
            return Err(syntax(format!("condition `{part}` must be `<a> <cmp> <b>`")));
        };
        let op = CompareOp::from_symbol(symbol)
            .ok_or_else(|| syntax(format!("unknown comparison `{symbol}`")))?;
        let left = parse_operand(builder, left)?;
        let right = parse_operand(builder, right)?;
        conditions.push(builder.lower().compare(&left, op, &right)?);
    }
    Ok(conditions)
}

fn parse_slot(builder: &mut ScriptBuilder, token: &str) -> Result<Slot, CommandError> {
    let slot = if let Some(name) = token.strip_prefix("p:") {
        Slot::player(name)
    } else if let Some(name) = token.strip_prefix("g:") {
        Slot::global(name)
    } else if let Some(rest) = token.strip_prefix("t:") {
        let (team, name) = rest
            .split_once(':')
            .ok_or_else(|| syntax(format!("team slot `{token}` must be `t:<team>:<name>`")))?;
        Slot::team(name, team)
    } else {
        return Err(syntax(format!("`{token}` is not a slot (p:, g: or t:)")));
    };
    Ok(builder.declare(slot)?)
}

fn parse_operand(builder: &mut ScriptBuilder, token: &str) -> Result<Operand, CommandError> {
    if let Ok(value) = token.parse::<i64>() {
        return Ok(Operand::from(value));
    }
    if let Ok(value) = token.parse::<f64>() {
        return Ok(Operand::from(value));
    }
    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return Ok(Operand::from(Literal::Text(token[1..token.len() - 1].to_string())));
    }
    if token.len() >= 2 && token.starts_with('%') && token.ends_with('%') {
        return Ok(Operand::placeholder(token, DeclaredType::Any));
    }
    parse_slot(builder, token).map(Operand::from)
}

fn report_warnings(output: &FixOutput) {
    for warning in &output.warnings {
        eprintln!(
            "{} {}",
            Color::Yellow.bold().paint("warning:"),
            Color::Yellow.paint(warning.message.as_str())
        );
    }
}

struct StatHighlighter;

impl Highlighter for StatHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();
        if line.trim_start().starts_with("//") {
            styled.push((Style::new().fg(Color::DarkGray), line.to_string()));
            return styled;
        }

        let mut last_end = 0;
        for (start, word) in words(line) {
            if start > last_end {
                styled.push((Style::new(), line[last_end..start].to_string()));
            }
            styled.push((style_for(word), word.to_string()));
            last_end = start + word.len();
        }
        if last_end < line.len() {
            styled.push((Style::new(), line[last_end..].to_string()));
        }
        styled
    }
}

/// Whitespace-separated words with their byte offsets.
fn words(line: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (index, ch) in line.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(begin)) => {
                words.push((begin, &line[begin..index]));
                start = None;
            }
            (false, None) => start = Some(index),
            _ => {}
        }
    }
    if let Some(begin) = start {
        words.push((begin, &line[begin..]));
    }
    words
}

fn style_for(word: &str) -> Style {
    match word {
        "if" | "and" | "or" | "else" | "end" | "goto" | "call" | "exit" | "cancel" | "sign"
        | "abs" | "fullheal" | "maxhealth" | "note" => Style::new().fg(Color::Magenta).bold(),
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" => Style::new().fg(Color::Red).bold(),
        "+" | "-" | "*" | "/" | "//" | "%" | "**" | "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            Style::new().fg(Color::Red)
        }
        w if w.starts_with(':') => Style::new().fg(Color::Green),
        w if w.starts_with("p:") || w.starts_with("g:") || w.starts_with("t:") => {
            Style::new().fg(Color::Cyan)
        }
        w if w.starts_with('%') => Style::new().fg(Color::Blue),
        w if w.starts_with('\'') => Style::new().fg(Color::Green),
        w if w.parse::<f64>().is_ok() => Style::new().fg(Color::Yellow),
        _ => Style::new(),
    }
}

fn run_repl(capacities: Capacities) {
    println!("{}", Color::Cyan.bold().paint("statc interactive REPL"));
    println!(
        "{}",
        Color::DarkGray.paint(format!(
            "  {} changes per kind, {} conditionals per container",
            capacities.change_limit, capacities.conditional_limit
        ))
    );
    println!("{}", Color::DarkGray.paint("  Type :help for available commands"));
    println!();

    let mut line_editor = Reedline::create().with_highlighter(Box::new(StatHighlighter));
    let mut builder = ScriptBuilder::new().with_capacities(capacities);
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("statc".to_string()),
        DefaultPromptSegment::Empty,
    );

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.starts_with(':') {
                    match trimmed {
                        ":help" | ":h" => show_help(),
                        ":show" | ":s" => show_program(&builder, &capacities),
                        ":reset" | ":r" => {
                            builder = ScriptBuilder::new().with_capacities(capacities);
                            println!("{}", Color::Green.paint("✓ Script cleared"));
                        }
                        ":exit" | ":quit" | ":q" => {
                            println!("{}", Color::Cyan.paint("Goodbye!"));
                            break;
                        }
                        _ => println!(
                            "{}",
                            Color::Red.paint(format!("Unknown command: {trimmed}"))
                        ),
                    }
                    continue;
                }
                match execute(&mut builder, trimmed) {
                    Ok(()) => {
                        for instruction in builder.checkpoint() {
                            println!("{} {}", Color::Blue.bold().paint("=>"), instruction);
                        }
                    }
                    Err(err) => {
                        builder.checkpoint();
                        println!(
                            "{} {}",
                            Color::Red.bold().paint("✗"),
                            Color::Red.paint(err.to_string())
                        );
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("{}", Color::Yellow.paint("^C (use :exit to quit)"));
            }
            Ok(Signal::CtrlD) => {
                println!("{}", Color::Cyan.paint("Goodbye!"));
                break;
            }
            Err(err) => {
                eprintln!("{}", Color::Red.paint(format!("Error: {err}")));
                break;
            }
        }
    }
}

/// Fixed program so far. The builder stays open for further statements.
fn show_program(builder: &ScriptBuilder, capacities: &Capacities) {
    match fixer::fix(&builder.lines(), capacities) {
        Ok(output) => {
            println!();
            print!("{}", render(&output.instructions));
            println!();
            println!(
                "{}",
                Color::DarkGray.paint(format!(
                    "  {} filler conditional(s), {} auxiliary container(s)",
                    output.fillers,
                    output.auxiliary.len()
                ))
            );
            report_warnings(&output);
        }
        Err(err) => println!(
            "{} {}",
            Color::Red.bold().paint("✗"),
            Color::Red.paint(err.to_string())
        ),
    }
}

fn show_help() {
    println!();
    println!("{}", Color::Cyan.bold().paint("REPL commands"));
    println!("  {}  Show this help message", Color::Green.paint(":help, :h"));
    println!("  {}  Print the block-limit-fixed program", Color::Green.paint(":show, :s"));
    println!("  {}  Start a new script", Color::Green.paint(":reset, :r"));
    println!("  {}  Exit the REPL", Color::Green.paint(":exit, :quit, :q"));
    println!();
    println!("{}", Color::Cyan.bold().paint("Statements"));
    println!("  {} Slots: p:name, g:name, t:team:name", Color::Yellow.paint("•"));
    println!("  {} Values: 42, 2.5, 'text', %placeholder%, or a slot", Color::Yellow.paint("•"));
    println!("    {}    p:x = p:a * 3", Color::DarkGray.paint("Example:"));
    println!("    {}    p:x = p:a ** 5", Color::DarkGray.paint("Example:"));
    println!("    {}    g:r = p:a % 7", Color::DarkGray.paint("Example:"));
    println!("    {}    p:s = sign p:a      p:m = abs p:a", Color::DarkGray.paint("Example:"));
    println!("    {}    p:x += 1      p:x %= p:d", Color::DarkGray.paint("Example:"));
    println!("  {} Control flow", Color::Yellow.paint("•"));
    println!("    {}    if and p:x > 3, g:r == 0", Color::DarkGray.paint("Example:"));
    println!("    {}    else / end / goto tick / call reward", Color::DarkGray.paint("Example:"));
    println!("  {} Actions: exit, cancel, fullheal, maxhealth 40, // comment", Color::Yellow.paint("•"));
    println!("    {}    note 'score' p:x", Color::DarkGray.paint("Example:"));
    println!();
}
