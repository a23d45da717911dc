use indexmap::IndexMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::lower::LowerError;

/// Storage scope of a remote slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Player,
    Global,
    Team,
    Temp,
}

impl Scope {
    fn prefix(&self) -> &'static str {
        match self {
            Scope::Player | Scope::Temp => "stat",
            Scope::Global => "globalstat",
            Scope::Team => "teamstat",
        }
    }

    fn placeholder_kind(&self) -> &'static str {
        match self {
            Scope::Player | Scope::Temp => "player",
            Scope::Global => "global",
            Scope::Team => "team",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Player => "player",
            Scope::Global => "global",
            Scope::Team => "team",
            Scope::Temp => "temp",
        })
    }
}

/// Declared value type of a slot or operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeclaredType {
    #[default]
    Any,
    Long,
    Double,
    String,
}

impl DeclaredType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DeclaredType::Long | DeclaredType::Double)
    }

    /// Compatibility with `self` on the left and `other` on the right.
    /// `literal_involved` lets a numeric literal take on the other side's numeric kind.
    pub fn accepts(self, other: DeclaredType, literal_involved: bool) -> bool {
        match (self, other) {
            (DeclaredType::Any, _) | (_, DeclaredType::Any) => true,
            (DeclaredType::String, _) => true,
            (left, right) if left == right => true,
            (left, right) => literal_involved && left.is_numeric() && right.is_numeric(),
        }
    }

    /// Result type of an arithmetic combination of two compatible types.
    pub fn join(self, other: DeclaredType) -> DeclaredType {
        match (self, other) {
            (DeclaredType::Any, other) => other,
            (left, DeclaredType::Any) => left,
            (DeclaredType::Double, _) | (_, DeclaredType::Double) => DeclaredType::Double,
            (left, _) => left,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclaredType::Any => "any",
            DeclaredType::Long => "long",
            DeclaredType::Double => "double",
            DeclaredType::String => "string",
        })
    }
}

/// Identity of a slot: `(scope, name[, team])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    scope: Scope,
    name: String,
    team: Option<String>,
}

/// Named remote mutable value. Equality and hashing only look at the identity key.
#[derive(Debug, Clone)]
pub struct Slot {
    key: SlotKey,
    declared: DeclaredType,
    auto_unset: bool,
}

impl Slot {
    pub fn player(name: impl Into<String>) -> Self {
        Self::new(Scope::Player, name, None)
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(Scope::Global, name, None)
    }

    pub fn team(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self::new(Scope::Team, name, Some(team.into()))
    }

    fn new(scope: Scope, name: impl Into<String>, team: Option<String>) -> Self {
        Self {
            key: SlotKey {
                scope,
                name: name.into(),
                team,
            },
            declared: DeclaredType::Any,
            auto_unset: false,
        }
    }

    pub fn typed(mut self, declared: DeclaredType) -> Self {
        self.declared = declared;
        self
    }

    pub fn scope(&self) -> Scope {
        self.key.scope
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn team_name(&self) -> Option<&str> {
        self.key.team.as_deref()
    }

    pub fn declared(&self) -> DeclaredType {
        self.declared
    }

    pub fn key(&self) -> &SlotKey {
        &self.key
    }

    /// Temp slots are unset by the runtime once their defining instruction has run its course.
    pub fn is_auto_unset(&self) -> bool {
        self.auto_unset
    }

    pub fn assign_left(&self) -> String {
        match &self.key.team {
            Some(team) => format!("{} {} {}", self.key.scope.prefix(), self.key.name, team),
            None => format!("{} {}", self.key.scope.prefix(), self.key.name),
        }
    }

    pub fn assign_right(&self) -> String {
        match &self.key.team {
            Some(team) => format!(
                "%stat.{}/{} {}%",
                self.key.scope.placeholder_kind(),
                self.key.name,
                team
            ),
            None => format!(
                "%stat.{}/{}%",
                self.key.scope.placeholder_kind(),
                self.key.name
            ),
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Slot {}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key.team {
            Some(team) => write!(f, "{}.{}[{}]", self.key.scope, self.key.name, team),
            None => write!(f, "{}.{}", self.key.scope, self.key.name),
        }
    }
}

/// Hands out collision-free temp slot names. Nested lowering simply keeps counting.
#[derive(Debug, Default)]
pub struct TempAllocator {
    next: u64,
}

impl TempAllocator {
    pub fn allocate(&mut self, declared: DeclaredType) -> Slot {
        self.next += 1;
        let mut slot = Slot::new(Scope::Temp, format!("_t{}", self.next), None);
        slot.declared = declared;
        slot.auto_unset = true;
        slot
    }

    pub fn allocated(&self) -> u64 {
        self.next
    }
}

/// Canonical slot per identity key, so every reference to `player.x` sees one declared type.
#[derive(Debug, Default)]
pub struct SlotCache {
    slots: IndexMap<SlotKey, Slot>,
}

impl SlotCache {
    /// Registers `slot` or returns the cached instance. A cached `Any` is upgraded by a
    /// concrete declaration; two different concrete declarations conflict.
    pub fn intern(&mut self, slot: Slot) -> Result<Slot, LowerError> {
        match self.slots.get_mut(slot.key()) {
            Some(existing) => {
                if slot.declared != DeclaredType::Any && existing.declared != slot.declared {
                    if existing.declared != DeclaredType::Any {
                        return Err(LowerError::TypeIncompatible {
                            operation: "declare",
                            left: format!("{existing}: {}", existing.declared),
                            right: format!("{slot}: {}", slot.declared),
                        });
                    }
                    existing.declared = slot.declared;
                }
                Ok(existing.clone())
            }
            None => {
                self.slots.insert(slot.key().clone(), slot.clone());
                Ok(slot)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_declared_type() {
        let a = Slot::player("coins").typed(DeclaredType::Long);
        let b = Slot::player("coins");
        assert_eq!(a, b);
        assert_ne!(Slot::player("coins"), Slot::global("coins"));
        assert_ne!(Slot::team("kills", "red"), Slot::team("kills", "blue"));
    }

    #[test]
    fn renders_three_forms() {
        let team = Slot::team("kills", "red");
        assert_eq!(team.assign_left(), "teamstat kills red");
        assert_eq!(team.assign_right(), "%stat.team/kills red%");
        assert_eq!(Slot::global("round").assign_left(), "globalstat round");
        assert_eq!(Slot::player("x").assign_right(), "%stat.player/x%");
    }

    #[test]
    fn temps_are_unique_and_auto_unset() {
        let mut temps = TempAllocator::default();
        let first = temps.allocate(DeclaredType::Long);
        let second = temps.allocate(DeclaredType::Any);
        assert_ne!(first, second);
        assert!(first.is_auto_unset());
        assert_eq!(first.scope(), Scope::Temp);
        assert_eq!(first.assign_left(), "stat _t1");
        assert_eq!(temps.allocated(), 2);
    }

    #[test]
    fn cache_upgrades_any_and_rejects_conflicts() {
        let mut cache = SlotCache::default();
        cache.intern(Slot::player("hp")).expect("first declaration");
        let upgraded = cache
            .intern(Slot::player("hp").typed(DeclaredType::Long))
            .expect("any upgrades");
        assert_eq!(upgraded.declared(), DeclaredType::Long);

        let plain = cache.intern(Slot::player("hp")).expect("untyped reuse");
        assert_eq!(plain.declared(), DeclaredType::Long);

        let conflict = cache.intern(Slot::player("hp").typed(DeclaredType::String));
        assert!(matches!(conflict, Err(LowerError::TypeIncompatible { .. })));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lattice_rules() {
        use DeclaredType::*;
        assert!(Any.accepts(String, false));
        assert!(Long.accepts(Any, false));
        assert!(String.accepts(Long, false));
        assert!(Long.accepts(Double, true));
        assert!(!Long.accepts(Double, false));
        assert!(!Long.accepts(String, false));
        assert_eq!(Long.join(Double), Double);
        assert_eq!(Any.join(Long), Long);
    }
}
