//! Block-limit fixer: one rewrite pass that makes every container fit the runtime's
//! per-block capacities by inserting filler conditionals and moving instruction ranges
//! into auxiliary containers.
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

use crate::config::Capacities;
use crate::stream::{reindent, ChangeKind, Instruction, StructuralError, Tag};

const MAX_HEALTH: &str = "maxHealth";
const FULL_HEAL: &str = "fullHeal";
const FILLER_OPEN: &str = "if and () {";
const HEADER_PREFIX: &str = "goto function \"";
const PLACEHOLDER_PREFIX: &str = "// function \"unnamed ";

/// Supplies the name of the container a `Goto` line opens, or `None` when it has none.
pub trait ContainerNaming {
    fn container_name(&self, header: &Instruction) -> Option<String>;
}

/// Reads names out of `goto function "<name>"` headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionHeaders;

impl ContainerNaming for FunctionHeaders {
    fn container_name(&self, header: &Instruction) -> Option<String> {
        header
            .text
            .trim()
            .strip_prefix(HEADER_PREFIX)
            .and_then(|rest| rest.strip_suffix('"'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}

pub fn container_header(name: &str) -> Instruction {
    Instruction::new(format!("{HEADER_PREFIX}{name}\""), Tag::Goto)
}

pub fn function_call(name: &str) -> Instruction {
    Instruction::new(format!("function \"{name}\""), Tag::TriggerFunction)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixWarning {
    pub container: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixOutput {
    pub instructions: Vec<Instruction>,
    /// Auxiliary containers created by this pass, in emission order.
    pub auxiliary: Vec<String>,
    pub fillers: usize,
    pub warnings: Vec<FixWarning>,
}

/// Fixes a whole flattened program using `goto function "<name>"` headers for naming.
pub fn fix(lines: &[Instruction], capacities: &Capacities) -> Result<FixOutput, StructuralError> {
    fix_with(lines, capacities, &FunctionHeaders)
}

pub fn fix_with(
    lines: &[Instruction],
    capacities: &Capacities,
    naming: &dyn ContainerNaming,
) -> Result<FixOutput, StructuralError> {
    let fused = fuse_max_health(lines);
    let segments = split_containers(&fused, naming)?;
    let mut taken: HashSet<String> = segments.iter().filter_map(|s| s.name.clone()).collect();
    let mut unnamed = fused
        .iter()
        .filter_map(|line| placeholder_number(&line.text))
        .max()
        .unwrap_or(0);

    let mut output = FixOutput {
        instructions: Vec::with_capacity(fused.len()),
        auxiliary: Vec::new(),
        fillers: 0,
        warnings: Vec::new(),
    };
    for segment in segments {
        let mut fitter = Fitter::new(
            capacities,
            segment.name.as_deref(),
            &mut taken,
            &mut unnamed,
        );
        let body = fitter.fit_container(segment.body);
        output.instructions.extend(segment.header);
        output.instructions.extend(body);
        output.auxiliary.append(&mut fitter.created);
        output.fillers += fitter.fillers;
        output.warnings.append(&mut fitter.warnings);
    }
    reindent(&mut output.instructions);

    info!(
        lines = output.instructions.len(),
        auxiliary = output.auxiliary.len(),
        fillers = output.fillers,
        warnings = output.warnings.len(),
        "block limits fixed"
    );
    Ok(output)
}

/// `maxHealth <n>` directly followed by `fullHeal` becomes `maxHealth <n> true`;
/// a lone `maxHealth <n>` gets an explicit `false`.
fn fuse_max_health(lines: &[Instruction]) -> Vec<Instruction> {
    let mut fused = Vec::with_capacity(lines.len());
    let mut iter = lines.iter().peekable();
    while let Some(line) = iter.next() {
        let Some(amount) = unflagged_max_health(&line.text) else {
            fused.push(line.clone());
            continue;
        };
        let heal = iter
            .peek()
            .is_some_and(|next| next.text.trim() == FULL_HEAL);
        if heal {
            iter.next();
        }
        let mut rewritten = line.clone();
        rewritten.text = format!("{MAX_HEALTH} {amount} {heal}");
        fused.push(rewritten);
    }
    fused
}

fn placeholder_number(text: &str) -> Option<usize> {
    text.strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix('"')?
        .parse()
        .ok()
}

fn unflagged_max_health(text: &str) -> Option<&str> {
    let mut parts = text.split_whitespace();
    if parts.next() != Some(MAX_HEALTH) {
        return None;
    }
    let amount = parts.next()?;
    parts.next().is_none().then_some(amount)
}

struct Segment {
    header: Option<Instruction>,
    name: Option<String>,
    body: Vec<Instruction>,
}

/// Cuts the stream at container headers and rejects anything deeper than one level.
fn split_containers(
    lines: &[Instruction],
    naming: &dyn ContainerNaming,
) -> Result<Vec<Segment>, StructuralError> {
    let mut segments = vec![Segment {
        header: None,
        name: None,
        body: Vec::new(),
    }];
    let mut open: Option<(usize, &str)> = None;
    let mut in_else = false;

    for (index, line) in lines.iter().enumerate() {
        match line.tag {
            Tag::Goto => {
                if open.is_some() {
                    return Err(StructuralError::GotoInsideConditional {
                        index,
                        text: line.text.clone(),
                    });
                }
                segments.push(Segment {
                    header: Some(line.clone()),
                    name: naming.container_name(line),
                    body: Vec::new(),
                });
                continue;
            }
            tag if tag.opens_conditional() => {
                if open.is_some() {
                    return Err(StructuralError::NestedConditional {
                        index,
                        text: line.text.clone(),
                    });
                }
                open = Some((index, &line.text));
            }
            Tag::ElseEnter => {
                if open.is_none() || in_else {
                    return Err(StructuralError::ElseWithoutIf { index });
                }
                in_else = true;
            }
            Tag::CondExit | Tag::ElseExit => {
                if open.take().is_none() {
                    return Err(StructuralError::UnmatchedClose {
                        index,
                        text: line.text.clone(),
                    });
                }
                in_else = false;
            }
            _ => {}
        }
        if let Some(segment) = segments.last_mut() {
            segment.body.push(line.clone());
        }
    }

    match open {
        Some((index, text)) => Err(StructuralError::UnclosedConditional {
            index,
            text: text.to_string(),
        }),
        None => Ok(segments),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Outside,
    /// Body of a conditional written by the user (or one left by an earlier pass).
    InUser,
    /// Body of a filler conditional opened by this pass.
    InFiller,
}

enum Split {
    Relocated,
    Placeholder,
}

type Counts = [usize; 4];

/// Fits one top-level container and the auxiliary containers split off from it.
struct Fitter<'a> {
    capacities: &'a Capacities,
    base: Option<&'a str>,
    taken: &'a mut HashSet<String>,
    /// Placeholder counter shared by every anonymous container in the program.
    unnamed: &'a mut usize,
    next_suffix: usize,
    pending: VecDeque<(String, Vec<Instruction>)>,
    trailing: Vec<Instruction>,
    created: Vec<String>,
    fillers: usize,
    warnings: Vec<FixWarning>,
}

impl<'a> Fitter<'a> {
    fn new(
        capacities: &'a Capacities,
        base: Option<&'a str>,
        taken: &'a mut HashSet<String>,
        unnamed: &'a mut usize,
    ) -> Self {
        Self {
            capacities,
            base,
            taken,
            unnamed,
            next_suffix: 1,
            pending: VecDeque::new(),
            trailing: Vec::new(),
            created: Vec::new(),
            fillers: 0,
            warnings: Vec::new(),
        }
    }

    /// Fitted body followed by every auxiliary container it spawned.
    fn fit_container(&mut self, body: Vec<Instruction>) -> Vec<Instruction> {
        let mut out = self.fit_body(&body);
        out.append(&mut self.trailing);
        while let Some((name, relocated)) = self.pending.pop_front() {
            out.push(container_header(&name));
            out.extend(self.fit_body(&relocated));
        }
        out
    }

    fn fit_body(&mut self, body: &[Instruction]) -> Vec<Instruction> {
        let change_limit = self.capacities.change_limit;
        let conditional_limit = self.capacities.conditional_limit;
        let mut out = Vec::with_capacity(body.len());
        let mut outside: Counts = [0; 4];
        let mut inside: Counts = [0; 4];
        let mut openings = 0usize;
        let mut mode = Mode::Outside;

        let mut index = 0;
        while index < body.len() {
            let line = &body[index];
            match line.tag {
                tag if tag.opens_conditional() => {
                    if mode == Mode::InFiller {
                        out.push(filler_close());
                    }
                    if openings >= conditional_limit {
                        match self.split(&body[index..], &mut out) {
                            Split::Relocated => return out,
                            Split::Placeholder => {
                                openings = 0;
                                outside = [0; 4];
                            }
                        }
                    }
                    openings += 1;
                    inside = [0; 4];
                    mode = Mode::InUser;
                    out.push(line.clone());
                }
                Tag::ElseEnter => {
                    inside = [0; 4];
                    out.push(line.clone());
                }
                Tag::CondExit | Tag::ElseExit => {
                    mode = Mode::Outside;
                    out.push(line.clone());
                }
                Tag::Comment if line.text.starts_with(PLACEHOLDER_PREFIX) => {
                    // An earlier pass split here without a container to move into.
                    if mode == Mode::InUser {
                        inside = [0; 4];
                    } else {
                        if mode == Mode::InFiller {
                            out.push(filler_close());
                            mode = Mode::Outside;
                        }
                        openings = 0;
                        outside = [0; 4];
                    }
                    out.push(line.clone());
                }
                Tag::VarChange(kind) => {
                    let k = kind.index();
                    if mode == Mode::InFiller && inside[k] >= change_limit {
                        out.push(filler_close());
                        mode = Mode::Outside;
                    }
                    match mode {
                        Mode::InFiller => {
                            inside[k] += 1;
                            out.push(line.clone());
                        }
                        Mode::InUser if inside[k] < change_limit => {
                            inside[k] += 1;
                            out.push(line.clone());
                        }
                        Mode::InUser => {
                            let end = body[index..]
                                .iter()
                                .position(|l| l.tag.closes_body())
                                .map_or(body.len(), |offset| index + offset);
                            match self.split(&body[index..end], &mut out) {
                                Split::Relocated => {
                                    index = end;
                                    continue;
                                }
                                Split::Placeholder => {
                                    inside = [0; 4];
                                    inside[k] = 1;
                                    out.push(line.clone());
                                }
                            }
                        }
                        Mode::Outside if outside[k] < change_limit => {
                            outside[k] += 1;
                            out.push(line.clone());
                        }
                        Mode::Outside if openings < conditional_limit => {
                            out.push(Instruction::new(FILLER_OPEN, Tag::CondAndEnter));
                            self.fillers += 1;
                            openings += 1;
                            inside = [0; 4];
                            inside[k] = 1;
                            mode = Mode::InFiller;
                            out.push(line.clone());
                        }
                        Mode::Outside => match self.split(&body[index..], &mut out) {
                            Split::Relocated => return out,
                            Split::Placeholder => {
                                openings = 0;
                                outside = [0; 4];
                                outside[k] = 1;
                                out.push(line.clone());
                            }
                        },
                    }
                }
                _ => out.push(line.clone()),
            }
            index += 1;
        }

        if mode == Mode::InFiller {
            out.push(filler_close());
        }
        out
    }

    /// Moves `range` into a fresh auxiliary container called from the current position.
    /// Unnamed containers cannot host a call target, so they only get commented placeholders.
    fn split(&mut self, range: &[Instruction], out: &mut Vec<Instruction>) -> Split {
        match self.base {
            Some(base) => {
                let name = self.next_name(base);
                out.push(function_call(&name));
                self.created.push(name.clone());
                self.pending.push_back((name, range.to_vec()));
                Split::Relocated
            }
            None => {
                *self.unnamed += 1;
                let name = format!("unnamed {}", self.unnamed);
                out.push(Instruction::new(
                    format!("// function \"{name}\""),
                    Tag::Comment,
                ));
                self.trailing.push(Instruction::new(
                    format!("// goto function \"{name}\""),
                    Tag::Comment,
                ));
                let message = format!(
                    "capacity exceeded in an unnamed container; move the code after placeholder `{name}` into its own function"
                );
                warn!(placeholder = %name, "{}", message);
                self.warnings.push(FixWarning {
                    container: None,
                    message,
                });
                Split::Placeholder
            }
        }
    }

    fn next_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{base} {}", self.next_suffix);
            self.next_suffix += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn filler_close() -> Instruction {
    Instruction::new("}", Tag::CondExit)
}

/// Counts variable changes per kind, mostly useful for diagnostics and tests.
pub fn change_counts(lines: &[Instruction]) -> [(ChangeKind, usize); 4] {
    let mut counts = ChangeKind::ALL.map(|kind| (kind, 0));
    for line in lines {
        if let Tag::VarChange(kind) = line.tag {
            counts[kind.index()].1 += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: ChangeKind, n: usize) -> Instruction {
        Instruction::new(format!("stat v{n} inc 1"), Tag::VarChange(kind))
    }

    fn player_changes(range: std::ops::RangeInclusive<usize>) -> Vec<Instruction> {
        range.map(|n| change(ChangeKind::Player, n)).collect()
    }

    fn if_and() -> Instruction {
        Instruction::new("if and (stat a > 1) {", Tag::CondAndEnter)
    }

    fn if_or() -> Instruction {
        Instruction::new("if or (stat a > 1, stat b > 1) {", Tag::CondOrEnter)
    }

    fn close() -> Instruction {
        Instruction::new("}", Tag::CondExit)
    }

    fn message() -> Instruction {
        Instruction::new("chat \"hi\"", Tag::Misc)
    }

    fn conditionals(count: usize) -> Vec<Instruction> {
        (0..count).flat_map(|_| [if_and(), message(), close()]).collect()
    }

    fn texts(lines: &[Instruction]) -> Vec<&str> {
        lines.iter().map(|line| line.text.as_str()).collect()
    }

    fn run(lines: &[Instruction]) -> FixOutput {
        fix(lines, &Capacities::default()).expect("fixable stream")
    }

    fn assert_idempotent(lines: &[Instruction]) {
        let once = run(lines);
        let twice = run(&once.instructions);
        assert_eq!(once.instructions, twice.instructions);
        assert!(twice.auxiliary.is_empty());
        assert_eq!(twice.fillers, 0);
    }

    #[test]
    fn eleven_changes_open_one_filler() {
        let output = run(&player_changes(1..=11));
        assert_eq!(output.fillers, 1);
        assert!(output.auxiliary.is_empty());
        let lines = texts(&output.instructions);
        assert_eq!(lines[10], FILLER_OPEN);
        assert_eq!(lines[11], "stat v11 inc 1");
        assert_eq!(lines[12], "}");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn filler_wraps_changes_eleven_through_twenty() {
        let output = run(&player_changes(1..=20));
        assert_eq!(output.fillers, 1);
        let lines = texts(&output.instructions);
        assert_eq!(lines[10], FILLER_OPEN);
        assert_eq!(lines[11], "stat v11 inc 1");
        assert_eq!(lines[20], "stat v20 inc 1");
        assert_eq!(lines[21], "}");
        assert!(output
            .instructions
            .iter()
            .all(|line| line.tag != Tag::Goto));
    }

    #[test]
    fn twenty_first_change_opens_second_filler() {
        let output = run(&player_changes(1..=21));
        assert_eq!(output.fillers, 2);
        let lines = texts(&output.instructions);
        assert_eq!(&lines[21..], ["}", FILLER_OPEN, "stat v21 inc 1", "}"]);
    }

    #[test]
    fn kinds_are_counted_separately() {
        let mut lines = player_changes(1..=10);
        lines.extend((11..=20).map(|n| change(ChangeKind::Global, n)));
        lines.extend((21..=30).map(|n| change(ChangeKind::Team, n)));
        let output = run(&lines);
        assert_eq!(output.fillers, 0);
        assert_eq!(output.instructions.len(), 30);
        let counts = change_counts(&output.instructions);
        assert_eq!(counts[ChangeKind::Global.index()].1, 10);
    }

    #[test]
    fn filler_closes_before_user_conditional() {
        let mut lines = player_changes(1..=12);
        lines.extend([if_and(), change(ChangeKind::Player, 13), close()]);
        let output = run(&lines);
        let fixed = texts(&output.instructions);
        assert_eq!(
            &fixed[10..],
            [
                FILLER_OPEN,
                "stat v11 inc 1",
                "stat v12 inc 1",
                "}",
                "if and (stat a > 1) {",
                "stat v13 inc 1",
                "}",
            ]
        );
    }

    #[test]
    fn sixteenth_opening_moves_to_auxiliary_container() {
        let mut lines = vec![container_header("main")];
        lines.extend(conditionals(16));
        lines.push(change(ChangeKind::Player, 1));
        let output = run(&lines);
        assert_eq!(output.auxiliary, ["main 1"]);

        let fixed = texts(&output.instructions);
        let call = fixed
            .iter()
            .position(|line| *line == "function \"main 1\"")
            .expect("call into auxiliary");
        assert_eq!(call, 1 + 15 * 3);
        assert_eq!(fixed[call + 1], "goto function \"main 1\"");
        assert_eq!(fixed[call + 2], "if and (stat a > 1) {");
        assert_eq!(fixed.last(), Some(&"stat v1 inc 1"));
        assert_idempotent(&lines);
    }

    #[test]
    fn else_bodies_do_not_count_as_openings() {
        let mut lines = vec![container_header("main")];
        for _ in 0..15 {
            lines.extend([
                if_or(),
                message(),
                Instruction::new("} else {", Tag::ElseEnter),
                message(),
                Instruction::new("}", Tag::ElseExit),
            ]);
        }
        let output = run(&lines);
        assert!(output.auxiliary.is_empty());
        assert_eq!(output.instructions.len(), lines.len());

        lines.extend([if_and(), message(), close()]);
        assert_eq!(run(&lines).auxiliary, ["main 1"]);
    }

    #[test]
    fn sixteenth_opening_in_unnamed_container_leaves_placeholders() {
        let mut lines = conditionals(16);
        lines.extend(player_changes(1..=3));
        let output = run(&lines);
        assert!(output.auxiliary.is_empty());
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].container, None);

        let fixed = texts(&output.instructions);
        assert_eq!(fixed[45], "// function \"unnamed 1\"");
        assert_eq!(fixed[46], "if and (stat a > 1) {");
        assert_eq!(fixed.last(), Some(&"// goto function \"unnamed 1\""));
        assert!(output
            .instructions
            .iter()
            .all(|line| line.tag != Tag::Goto && line.tag != Tag::TriggerFunction));
        assert_idempotent(&lines);
    }

    #[test]
    fn user_conditional_overflow_relocates_rest_of_body() {
        let mut lines = vec![container_header("tick"), if_and()];
        lines.extend(player_changes(1..=12));
        lines.push(close());
        lines.push(message());
        let output = run(&lines);
        assert_eq!(output.auxiliary, ["tick 1"]);

        let fixed = texts(&output.instructions);
        assert_eq!(fixed[11], "stat v10 inc 1");
        assert_eq!(fixed[12], "function \"tick 1\"");
        assert_eq!(fixed[13], "}");
        assert_eq!(fixed[14], "chat \"hi\"");
        assert_eq!(
            &fixed[15..],
            ["goto function \"tick 1\"", "stat v11 inc 1", "stat v12 inc 1"]
        );
        assert_eq!(output.instructions[12].indent, 1);
        assert_idempotent(&lines);
    }

    #[test]
    fn relocation_stops_at_else() {
        let mut lines = vec![container_header("tick"), if_and()];
        lines.extend(player_changes(1..=11));
        lines.push(Instruction::new("} else {", Tag::ElseEnter));
        lines.extend(player_changes(12..=13));
        lines.push(Instruction::new("}", Tag::ElseExit));
        let output = run(&lines);

        let fixed = texts(&output.instructions);
        let else_at = fixed
            .iter()
            .position(|line| *line == "} else {")
            .expect("else kept");
        assert_eq!(fixed[else_at - 1], "function \"tick 1\"");
        assert_eq!(fixed[else_at + 1], "stat v12 inc 1");
        assert_eq!(fixed.last(), Some(&"stat v11 inc 1"));
    }

    #[test]
    fn exhausted_openings_relocate_changes_outside() {
        let mut lines = vec![container_header("main")];
        lines.extend(player_changes(1..=10));
        lines.extend(conditionals(15));
        lines.extend(player_changes(11..=12));
        let output = run(&lines);
        assert_eq!(output.fillers, 0);
        assert_eq!(output.auxiliary, ["main 1"]);
        let fixed = texts(&output.instructions);
        assert_eq!(
            &fixed[fixed.len() - 4..],
            [
                "function \"main 1\"",
                "goto function \"main 1\"",
                "stat v11 inc 1",
                "stat v12 inc 1"
            ]
        );
        assert_idempotent(&lines);
    }

    #[test]
    fn auxiliary_names_skip_existing_containers() {
        let mut lines = vec![container_header("main")];
        lines.extend(conditionals(16));
        lines.push(container_header("main 1"));
        lines.push(message());
        let output = run(&lines);
        assert_eq!(output.auxiliary, ["main 2"]);
    }

    #[test]
    fn auxiliary_containers_are_refitted() {
        let capacities = Capacities::default()
            .with_change_limit(2)
            .with_conditional_limit(1);
        let mut lines = vec![container_header("main")];
        lines.extend(player_changes(1..=9));
        let output = fix(&lines, &capacities).expect("fixable");
        assert_eq!(output.auxiliary, ["main 1", "main 2"]);
        assert_eq!(output.fillers, 2);
        let again = fix(&output.instructions, &capacities).expect("refix");
        assert_eq!(again.instructions, output.instructions);
    }

    #[test]
    fn max_health_fuses_with_following_heal() {
        let lines = vec![
            Instruction::new("maxHealth 40", Tag::VarChange(ChangeKind::Misc)),
            Instruction::new(FULL_HEAL, Tag::Misc),
            Instruction::new("maxHealth 20", Tag::VarChange(ChangeKind::Misc)),
            message(),
            Instruction::new("maxHealth 10 true", Tag::VarChange(ChangeKind::Misc)),
        ];
        let output = run(&lines);
        assert_eq!(
            texts(&output.instructions),
            [
                "maxHealth 40 true",
                "maxHealth 20 false",
                "chat \"hi\"",
                "maxHealth 10 true"
            ]
        );
        assert_idempotent(&lines);
    }

    #[test]
    fn structural_errors_abort() {
        let nested = vec![if_and(), if_or(), close(), close()];
        assert!(matches!(
            fix(&nested, &Capacities::default()),
            Err(StructuralError::NestedConditional { index: 1, .. })
        ));

        let goto_inside = vec![if_and(), container_header("other"), close()];
        assert!(matches!(
            fix(&goto_inside, &Capacities::default()),
            Err(StructuralError::GotoInsideConditional { .. })
        ));

        let unmatched = vec![message(), close()];
        assert!(matches!(
            fix(&unmatched, &Capacities::default()),
            Err(StructuralError::UnmatchedClose { index: 1, .. })
        ));

        let unclosed = vec![if_and(), message()];
        assert!(matches!(
            fix(&unclosed, &Capacities::default()),
            Err(StructuralError::UnclosedConditional { index: 0, .. })
        ));
    }

    #[test]
    fn header_naming() {
        let naming = FunctionHeaders;
        assert_eq!(
            naming.container_name(&container_header("on join")),
            Some("on join".to_string())
        );
        assert_eq!(
            naming.container_name(&Instruction::new("goto event \"x\"", Tag::Goto)),
            None
        );
    }

    #[test]
    fn unnamed_header_degrades_to_placeholders() {
        let mut lines = vec![Instruction::new("goto event \"Player Join\"", Tag::Goto)];
        lines.extend(conditionals(16));
        let output = run(&lines);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.instructions[0].text, "goto event \"Player Join\"");
    }

    #[test]
    fn anonymous_placeholders_are_numbered_program_wide() {
        let mut lines = conditionals(16);
        lines.push(Instruction::new("goto event \"Player Join\"", Tag::Goto));
        lines.extend(conditionals(16));
        let output = run(&lines);
        let markers: Vec<&str> = output
            .instructions
            .iter()
            .map(|line| line.text.as_str())
            .filter(|text| text.starts_with(PLACEHOLDER_PREFIX))
            .collect();
        assert_eq!(
            markers,
            ["// function \"unnamed 1\"", "// function \"unnamed 2\""]
        );
        assert_eq!(output.warnings.len(), 2);

        let again = run(&output.instructions);
        assert_eq!(again.instructions, output.instructions);
        assert!(again.warnings.is_empty());
    }
}
