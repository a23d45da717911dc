use indexmap::IndexMap;
use tracing::debug;

use crate::config::Capacities;
use crate::fixer::{self, FixOutput};
use crate::lower::{LowerError, Lowerer, LoweringContext};
use crate::slot::Slot;
use crate::stream::{ChangeKind, Instruction, InstructionStream, StructuralError, Tag};
use crate::value::{Condition, Operand, Render};
use crate::CompileError;

#[derive(Debug, Clone, Copy)]
struct OpenConditional {
    in_else: bool,
}

/// Builds a script statement by statement. Each call lowers immediately into the active
/// container; `finalize` flattens all containers and runs the block-limit fixer once.
#[derive(Debug)]
pub struct ScriptBuilder {
    ctx: LoweringContext,
    capacities: Capacities,
    containers: IndexMap<Option<String>, InstructionStream>,
    checkpoints: IndexMap<Option<String>, usize>,
    current: Option<String>,
    open: Option<OpenConditional>,
    /// Set only while the previous statement closed a user `if` body.
    else_allowed: bool,
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBuilder {
    pub fn new() -> Self {
        let mut containers = IndexMap::new();
        containers.insert(None, InstructionStream::new());
        Self {
            ctx: LoweringContext::new(),
            capacities: Capacities::default(),
            containers,
            checkpoints: IndexMap::new(),
            current: None,
            open: None,
            else_allowed: false,
        }
    }

    pub fn with_capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    pub fn declare(&mut self, slot: Slot) -> Result<Slot, LowerError> {
        self.ctx.declare(slot)
    }

    pub fn player(&mut self, name: &str) -> Result<Slot, LowerError> {
        self.declare(Slot::player(name))
    }

    pub fn global(&mut self, name: &str) -> Result<Slot, LowerError> {
        self.declare(Slot::global(name))
    }

    pub fn team(&mut self, name: &str, team: &str) -> Result<Slot, LowerError> {
        self.declare(Slot::team(name, team))
    }

    /// Lowering engine bound to the active container.
    pub fn lower(&mut self) -> Lowerer<'_> {
        self.else_allowed = false;
        let stream = self.containers.entry(self.current.clone()).or_default();
        Lowerer::new(&mut self.ctx, stream)
    }

    pub fn current_container(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Switches to (and creates on first use) the container called `name`.
    pub fn goto(&mut self, name: &str) -> Result<(), StructuralError> {
        if self.open.is_some() {
            return Err(StructuralError::GotoInsideConditional {
                index: self.current_lines().len(),
                text: fixer::container_header(name).text,
            });
        }
        self.else_allowed = false;
        self.current = Some(name.to_string());
        self.containers.entry(self.current.clone()).or_default();
        Ok(())
    }

    pub fn if_and(&mut self, conditions: &[Condition]) -> Result<(), StructuralError> {
        self.open_conditional("and", conditions, Tag::CondAndEnter)
    }

    pub fn if_or(&mut self, conditions: &[Condition]) -> Result<(), StructuralError> {
        self.open_conditional("or", conditions, Tag::CondOrEnter)
    }

    /// Reopens the conditional that was just closed as its `else` body.
    pub fn else_branch(&mut self) -> Result<(), StructuralError> {
        if self.open.is_some() || !self.else_allowed {
            return Err(StructuralError::ElseWithoutIf {
                index: self.current_lines().len(),
            });
        }
        self.else_allowed = false;
        self.stream_mut().append_to_previous(" else {", Tag::ElseEnter)?;
        self.stream_mut().indent();
        self.open = Some(OpenConditional { in_else: true });
        Ok(())
    }

    /// Closes the open `if` or `else` body.
    pub fn end(&mut self) -> Result<(), StructuralError> {
        let open = self.open.take().ok_or_else(|| StructuralError::UnmatchedClose {
            index: self.current_lines().len(),
            text: String::from("}"),
        })?;
        let tag = if open.in_else {
            Tag::ElseExit
        } else {
            Tag::CondExit
        };
        let stream = self.stream_mut();
        stream.dedent();
        stream.push(Instruction::new("}", tag));
        self.else_allowed = !open.in_else;
        Ok(())
    }

    pub fn trigger_function(&mut self, name: &str) {
        self.emit(fixer::function_call(name));
    }

    pub fn exit_function(&mut self) {
        self.emit(Instruction::new("exit", Tag::ExitFunction));
    }

    pub fn cancel_event(&mut self) {
        self.emit(Instruction::new("cancelEvent", Tag::CancelEvent));
    }

    pub fn comment(&mut self, text: &str) {
        self.emit(Instruction::new(format!("// {text}"), Tag::Comment));
    }

    /// Comment with operands interpolated in their in-string form, e.g. `// score %stat.player/x%`.
    pub fn note(&mut self, parts: &[Operand]) {
        let text = parts
            .iter()
            .map(Render::in_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.comment(&text);
    }

    pub fn max_health(&mut self, amount: i64) {
        self.emit(Instruction::new(
            format!("maxHealth {amount}"),
            Tag::VarChange(ChangeKind::Misc),
        ));
    }

    pub fn full_heal(&mut self) {
        self.emit(Instruction::new("fullHeal", Tag::Misc));
    }

    /// Appends an already rendered instruction, e.g. from an intrinsic catalog.
    pub fn emit(&mut self, instruction: Instruction) {
        self.else_allowed = false;
        self.stream_mut().push(instruction);
    }

    /// Inserts at the top of the active container, after earlier preamble lines.
    /// Also shifts the last checkpoint so lines already reported are not reported again.
    pub fn preamble(&mut self, instruction: Instruction) {
        self.stream_mut().insert_front(instruction);
        if let Some(mark) = self.checkpoints.get_mut(&self.current) {
            *mark += 1;
        }
    }

    /// Statement boundary: returns what the active container gained since the last one.
    pub fn checkpoint(&mut self) -> Vec<Instruction> {
        let key = self.current.clone();
        let mark = self.checkpoints.get(&key).copied().unwrap_or(0);
        let lines = self.current_lines();
        let emitted = lines[mark.min(lines.len())..].to_vec();
        let end = lines.len();
        self.checkpoints.insert(key, end);
        emitted
    }

    /// All containers flattened in creation order, each named one behind its header.
    pub fn lines(&self) -> Vec<Instruction> {
        let mut lines = Vec::new();
        for (name, stream) in &self.containers {
            if let Some(name) = name {
                lines.push(fixer::container_header(name));
            }
            lines.extend(stream.lines().iter().cloned());
        }
        lines
    }

    /// Ends the compilation unit and fixes block limits across every container.
    pub fn finalize(self) -> Result<FixOutput, CompileError> {
        if self.open.is_some() {
            return Err(StructuralError::UnclosedConditional {
                index: self.current_lines().len(),
                text: self.current.clone().unwrap_or_default(),
            }
            .into());
        }
        let lines = self.lines();
        debug!(
            containers = self.containers.len(),
            slots = self.ctx.slots().len(),
            temps = self.ctx.temps_allocated(),
            lines = lines.len(),
            "finalizing script"
        );
        Ok(fixer::fix(&lines, &self.capacities)?)
    }

    fn open_conditional(
        &mut self,
        mode: &str,
        conditions: &[Condition],
        tag: Tag,
    ) -> Result<(), StructuralError> {
        let rendered = conditions
            .iter()
            .map(Condition::text)
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("if {mode} ({rendered}) {{");
        if self.open.is_some() {
            return Err(StructuralError::NestedConditional {
                index: self.current_lines().len(),
                text,
            });
        }
        let stream = self.stream_mut();
        stream.push(Instruction::new(text, tag));
        stream.indent();
        self.open = Some(OpenConditional { in_else: false });
        self.else_allowed = false;
        Ok(())
    }

    fn current_lines(&self) -> &[Instruction] {
        self.containers
            .get(&self.current)
            .map(InstructionStream::lines)
            .unwrap_or_default()
    }

    fn stream_mut(&mut self) -> &mut InstructionStream {
        self.containers.entry(self.current.clone()).or_default()
    }
}
