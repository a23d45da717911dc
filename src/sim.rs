//! Executes emitted change and condition lines with 64-bit truncating arithmetic.
use std::collections::HashMap;

use crate::stream::{Instruction, Tag};
use crate::value::{Operand, Render};

const MODES: [&str; 5] = ["set", "inc", "dec", "multiply", "divide"];
const COMPARISONS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

#[derive(Debug, Default)]
pub struct Simulator {
    values: HashMap<String, i64>,
}

impl Simulator {
    pub fn run(&mut self, lines: &[Instruction]) {
        let mut skipping = false;
        for line in lines {
            match line.tag {
                Tag::CondAndEnter | Tag::CondOrEnter => {
                    skipping = !self.header_holds(&line.text, line.tag == Tag::CondAndEnter);
                }
                Tag::ElseEnter => skipping = !skipping,
                Tag::CondExit | Tag::ElseExit => skipping = false,
                Tag::VarChange(_) if !skipping => self.apply(&line.text),
                _ => {}
            }
        }
    }

    /// Value of a slot by its left-side form, e.g. `stat x`.
    pub fn get(&self, left: &str) -> i64 {
        self.values.get(left).copied().unwrap_or(0)
    }

    pub fn eval(&self, operand: &Operand) -> i64 {
        self.resolve(&operand.assign_right())
    }

    fn apply(&mut self, text: &str) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(position) = tokens.iter().position(|token| MODES.contains(token)) else {
            panic!("unrecognized change `{text}`");
        };
        let target = tokens[..position].join(" ");
        let value = self.resolve(&tokens[position + 1..].join(" "));
        let current = self.get(&target);
        let next = match tokens[position] {
            "set" => value,
            "inc" => current.wrapping_add(value),
            "dec" => current.wrapping_sub(value),
            "multiply" => current.wrapping_mul(value),
            _ => current.wrapping_div(value),
        };
        self.values.insert(target, next);
    }

    fn header_holds(&self, text: &str, all: bool) -> bool {
        let inner = text
            .split_once('(')
            .and_then(|(_, rest)| rest.rsplit_once(')'))
            .map(|(inner, _)| inner.trim())
            .unwrap_or_default();
        if inner.is_empty() {
            return true;
        }
        let mut results = inner.split(", ").map(|condition| self.holds(condition));
        if all {
            results.all(|held| held)
        } else {
            results.any(|held| held)
        }
    }

    fn holds(&self, condition: &str) -> bool {
        let tokens: Vec<&str> = condition.split_whitespace().collect();
        let Some(position) = tokens.iter().position(|token| COMPARISONS.contains(token)) else {
            panic!("unrecognized condition `{condition}`");
        };
        let left = self.get(&tokens[..position].join(" "));
        let right = self.resolve(&tokens[position + 1..].join(" "));
        match tokens[position] {
            "==" => left == right,
            "!=" => left != right,
            "<=" => left <= right,
            ">=" => left >= right,
            "<" => left < right,
            _ => left > right,
        }
    }

    fn resolve(&self, value: &str) -> i64 {
        if let Ok(number) = value.parse::<i64>() {
            return number;
        }
        let inner = value.trim_matches('%');
        let key = if let Some(name) = inner.strip_prefix("stat.player/") {
            format!("stat {name}")
        } else if let Some(name) = inner.strip_prefix("stat.global/") {
            format!("globalstat {name}")
        } else if let Some(name) = inner.strip_prefix("stat.team/") {
            format!("teamstat {name}")
        } else {
            panic!("unresolvable value `{value}`");
        };
        self.get(&key)
    }
}
