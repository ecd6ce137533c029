use crate::catalog::{Marker, Signature, TargetInfo};

/// Fully-qualified location known to be right for a specific host version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactPath {
    pub type_name: String,
    pub member: String,
    /// `None` accepts any overload.
    pub params: Option<Vec<String>>,
}

/// Expected parameter shape, used when names alone are not enough.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureShape {
    pub arity: Option<usize>,
    pub returns: Option<Option<String>>,
}

impl SignatureShape {
    #[must_use]
    pub fn arity(arity: usize) -> Self {
        Self {
            arity: Some(arity),
            returns: None,
        }
    }

    #[must_use]
    pub fn returning(mut self, returns: Option<&str>) -> Self {
        self.returns = Some(returns.map(str::to_owned));
        self
    }

    #[must_use]
    pub fn accepts(&self, signature: &Signature) -> bool {
        self.arity.is_none_or(|n| n == signature.arity())
            && self
                .returns
                .as_ref()
                .is_none_or(|r| *r == signature.returns)
    }
}

/// What a module is looking for inside the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetQuery {
    pub exact: Option<ExactPath>,
    pub unit_filters: Vec<String>,
    pub type_fragments: Vec<String>,
    pub member_names: Vec<String>,
    pub shape: Option<SignatureShape>,
    pub marker: Option<Marker>,
}

impl TargetQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exact(mut self, type_name: &str, member: &str, params: Option<&[&str]>) -> Self {
        self.exact = Some(ExactPath {
            type_name: type_name.to_owned(),
            member: member.to_owned(),
            params: params.map(|p| p.iter().map(|s| (*s).to_owned()).collect()),
        });
        self
    }

    #[must_use]
    pub fn in_units(mut self, filters: &[&str]) -> Self {
        self.unit_filters = filters.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn type_like(mut self, fragments: &[&str]) -> Self {
        self.type_fragments = fragments.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn member(mut self, names: &[&str]) -> Self {
        self.member_names = names.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn shaped(mut self, shape: SignatureShape) -> Self {
        self.shape = Some(shape);
        self
    }

    #[must_use]
    pub fn marked(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Member name and shape both acceptable. Member names match exactly;
    /// only unit and type names are matched by fragment.
    pub(super) fn member_matches(&self, member: &TargetInfo) -> bool {
        let name_ok =
            self.member_names.is_empty() || self.member_names.iter().any(|n| member.name == *n);
        name_ok
            && self
                .shape
                .as_ref()
                .is_none_or(|s| s.accepts(&member.signature))
    }

    /// Deterministic memoization key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut parts = Vec::new();
        if let Some(e) = &self.exact {
            let params = e
                .params
                .as_ref()
                .map(|p| format!("({})", p.join(",")))
                .unwrap_or_default();
            parts.push(format!("exact={}::{}{params}", e.type_name, e.member));
        }
        parts.push(format!("units={}", self.unit_filters.join("|")));
        parts.push(format!("types={}", self.type_fragments.join("|")));
        parts.push(format!("members={}", self.member_names.join("|")));
        if let Some(s) = &self.shape {
            let arity = s.arity.map_or_else(|| "*".to_owned(), |n| n.to_string());
            let returns = match &s.returns {
                None => "*",
                Some(None) => "void",
                Some(Some(ty)) => ty.as_str(),
            };
            parts.push(format!("shape={arity}->{returns}"));
        }
        if let Some(m) = &self.marker {
            let arg = m.argument.as_deref().unwrap_or("*");
            parts.push(format!("marker={}({arg})", m.name));
        }
        parts.join(";")
    }
}
