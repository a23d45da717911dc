use std::fmt;
use thiserror::Error;

/// Counter bucket for variable-change instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Player,
    Global,
    Team,
    Misc,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 4] = [
        ChangeKind::Player,
        ChangeKind::Global,
        ChangeKind::Team,
        ChangeKind::Misc,
    ];

    pub fn index(self) -> usize {
        match self {
            ChangeKind::Player => 0,
            ChangeKind::Global => 1,
            ChangeKind::Team => 2,
            ChangeKind::Misc => 3,
        }
    }
}

/// Structural role of an instruction. The fixer only ever looks at tags, never at text,
/// except for the container naming collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    VarChange(ChangeKind),
    CondAndEnter,
    CondOrEnter,
    CondExit,
    ElseEnter,
    ElseExit,
    TriggerFunction,
    ExitFunction,
    CancelEvent,
    Misc,
    Goto,
    Comment,
}

impl Tag {
    pub fn opens_conditional(self) -> bool {
        matches!(self, Tag::CondAndEnter | Tag::CondOrEnter)
    }

    pub fn closes_body(self) -> bool {
        matches!(self, Tag::CondExit | Tag::ElseEnter | Tag::ElseExit)
    }
}

/// One line of target-runtime syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub text: String,
    pub tag: Tag,
    /// Set on the instruction that defines a temp slot.
    pub auto_unset: bool,
    /// Nesting depth for printing only.
    pub indent: usize,
}

impl Instruction {
    pub fn new(text: impl Into<String>, tag: Tag) -> Self {
        Self {
            text: text.into(),
            tag,
            auto_unset: false,
            indent: 0,
        }
    }

    pub fn auto_unset(mut self) -> Self {
        self.auto_unset = true;
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:width$}{}", "", self.text, width = self.indent * 4)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StructuralError {
    #[error("conditional at instruction {index} (`{text}`) is nested inside another conditional")]
    NestedConditional { index: usize, text: String },
    #[error("container switch at instruction {index} (`{text}`) happens inside a conditional")]
    GotoInsideConditional { index: usize, text: String },
    #[error("instruction {index} (`{text}`) closes a conditional that was never opened")]
    UnmatchedClose { index: usize, text: String },
    #[error("conditional opened at instruction {index} (`{text}`) is never closed")]
    UnclosedConditional { index: usize, text: String },
    #[error("`else` at instruction {index} does not follow a closed `if` body")]
    ElseWithoutIf { index: usize },
    #[error("cannot fuse `{text}` onto an empty stream")]
    FuseOnEmpty { text: String },
}

/// Ordered instruction list for one container.
#[derive(Debug, Clone, Default)]
pub struct InstructionStream {
    lines: Vec<Instruction>,
    front: usize,
    indent: usize,
}

impl InstructionStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut instruction: Instruction) {
        instruction.indent = self.indent;
        self.lines.push(instruction);
    }

    /// Inserts after every earlier front insertion, so preambles keep their relative order.
    pub fn insert_front(&mut self, mut instruction: Instruction) {
        instruction.indent = 0;
        self.lines.insert(self.front, instruction);
        self.front += 1;
    }

    /// Fuses `suffix` onto the last line and retags it, e.g. `}` + ` else {`.
    /// The last line must be the close of a balanced conditional.
    pub fn append_to_previous(&mut self, suffix: &str, tag: Tag) -> Result<(), StructuralError> {
        let index = self.lines.len();
        let last = self.lines.last_mut().ok_or_else(|| StructuralError::FuseOnEmpty {
            text: suffix.to_string(),
        })?;
        if last.tag != Tag::CondExit || self.indent != 0 {
            return Err(StructuralError::ElseWithoutIf { index });
        }
        last.text.push_str(suffix);
        last.tag = tag;
        Ok(())
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Current length, used as a rollback point.
    pub fn mark(&self) -> usize {
        self.lines.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.lines.truncate(mark.max(self.front));
    }

    pub fn drain_from(&mut self, mark: usize) -> Vec<Instruction> {
        self.lines.drain(mark.max(self.front)..).collect()
    }

    pub fn extend(&mut self, instructions: Vec<Instruction>) {
        self.lines.extend(instructions);
    }

    pub fn lines(&self) -> &[Instruction] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<Instruction> {
        self.lines
    }
}

/// Recomputes indentation from tags.
pub fn reindent(lines: &mut [Instruction]) {
    let mut depth = 0usize;
    for line in lines.iter_mut() {
        match line.tag {
            Tag::CondExit | Tag::ElseExit => {
                depth = depth.saturating_sub(1);
                line.indent = depth;
            }
            Tag::ElseEnter => line.indent = depth.saturating_sub(1),
            Tag::Goto => {
                depth = 0;
                line.indent = 0;
            }
            _ => line.indent = depth,
        }
        if line.tag.opens_conditional() {
            depth += 1;
        }
    }
}

/// Prints a finished stream, one instruction per line.
pub fn render(lines: &[Instruction]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}
