//! Host catalogue: the build-time registry of interceptable operations.
//!
//! The host publishes every operation it is willing to route through the
//! [`InterceptionEngine`](crate::engine::InterceptionEngine) as a member of a
//! type inside a code unit. Names are the host's own and are expected to drift
//! between host releases; the [`resolver`](crate::resolver) is what copes with
//! that drift.

use std::fmt;
use std::sync::Arc;

use crate::contracts::InterceptKinds;

/// Stable identity of one interceptable operation.
///
/// Rendered as `"<type>::<member>(<p1>,<p2>)"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(Arc<str>);

impl TargetId {
    #[must_use]
    pub fn new(owner: &str, member: &str, signature: &Signature) -> Self {
        let id = format!("{owner}::{member}({})", signature.params.join(","));
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameter and return type names of a member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<String>,
    pub returns: Option<String>,
}

impl Signature {
    #[must_use]
    pub fn new<I, S>(params: I, returns: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            returns: returns.map(str::to_owned),
        }
    }

    #[must_use]
    pub fn nullary(returns: Option<&str>) -> Self {
        Self {
            params: Vec::new(),
            returns: returns.map(str::to_owned),
        }
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.params.join(", "))?;
        match &self.returns {
            Some(ret) => write!(f, " -> {ret}"),
            None => Ok(()),
        }
    }
}

/// Declarative marker attached to a type, e.g. `EditsType(Transform)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Marker {
    pub name: String,
    pub argument: Option<String>,
}

impl Marker {
    #[must_use]
    pub fn new(name: impl Into<String>, argument: Option<&str>) -> Self {
        Self {
            name: name.into(),
            argument: argument.map(str::to_owned),
        }
    }
}

/// A single interceptable operation as the host describes it.
#[derive(Debug)]
pub struct TargetInfo {
    pub id: TargetId,
    pub unit: String,
    pub owner: String,
    pub name: String,
    pub signature: Signature,
    /// Interception kinds the host will not accept on this member.
    pub refuses: InterceptKinds,
}

/// Shared handle to a resolved target.
pub type TargetHandle = Arc<TargetInfo>;

/// Builder-side description of a member before it is sealed into a unit.
#[derive(Clone, Debug)]
struct MemberDecl {
    name: String,
    signature: Signature,
    refuses: InterceptKinds,
}

/// A type exposing interceptable members.
#[derive(Clone, Debug)]
pub struct TypeEntry {
    pub full_name: String,
    pub markers: Vec<Marker>,
    members: Vec<MemberDecl>,
    sealed: Vec<TargetHandle>,
}

impl TypeEntry {
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            markers: Vec::new(),
            members: Vec::new(),
            sealed: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    #[must_use]
    pub fn with_member(self, name: impl Into<String>, signature: Signature) -> Self {
        self.with_guarded_member(name, signature, InterceptKinds::empty())
    }

    /// Adds a member that rejects some interception kinds (e.g. inlined bodies
    /// that cannot be rewritten).
    #[must_use]
    pub fn with_guarded_member(
        mut self,
        name: impl Into<String>,
        signature: Signature,
        refuses: InterceptKinds,
    ) -> Self {
        self.members.push(MemberDecl {
            name: name.into(),
            signature,
            refuses,
        });
        self
    }

    #[must_use]
    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.iter().any(|m| {
            m.name == marker.name && (marker.argument.is_none() || m.argument == marker.argument)
        })
    }

    /// Members of this type; empty until the owning unit is added to a catalog.
    #[must_use]
    pub fn members(&self) -> &[TargetHandle] {
        &self.sealed
    }

    fn seal(&mut self, unit: &str) {
        self.sealed = self
            .members
            .iter()
            .map(|m| {
                Arc::new(TargetInfo {
                    id: TargetId::new(&self.full_name, &m.name, &m.signature),
                    unit: unit.to_owned(),
                    owner: self.full_name.clone(),
                    name: m.name.clone(),
                    signature: m.signature.clone(),
                    refuses: m.refuses,
                })
            })
            .collect();
    }
}

/// A loaded code unit (library, assembly, plugin image).
#[derive(Clone, Debug)]
pub struct CodeUnit {
    pub name: String,
    pub types: Vec<TypeEntry>,
}

impl CodeUnit {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, ty: TypeEntry) -> Self {
        self.types.push(ty);
        self
    }
}

/// Everything the host currently has loaded. Replaced wholesale on code reload.
#[derive(Clone, Debug, Default)]
pub struct HostCatalog {
    units: Vec<CodeUnit>,
}

impl HostCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_unit(mut self, mut unit: CodeUnit) -> Self {
        let unit_name = unit.name.clone();
        for ty in &mut unit.types {
            ty.seal(&unit_name);
        }
        self.units.push(unit);
        self
    }

    #[must_use]
    pub fn units(&self) -> &[CodeUnit] {
        &self.units
    }

    /// All types across all units, in load order.
    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.units.iter().flat_map(|u| u.types.iter())
    }

    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeEntry> {
        self.types().find(|t| t.full_name == full_name)
    }

    /// Looks up a target by its id across the whole catalog.
    #[must_use]
    pub fn target(&self, id: &TargetId) -> Option<TargetHandle> {
        self.types()
            .flat_map(|t| t.members().iter())
            .find(|m| &m.id == id)
            .cloned()
    }
}
