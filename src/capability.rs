use std::fmt;
use std::rc::Rc;

/// Host callback exposed as a script-visible method.
///
/// Receives the call arguments marshalled into [`HostValue`]s. An `Err`
/// message is thrown into the calling script as an `Error`.
pub type HostFunction = Rc<dyn Fn(&[HostValue]) -> std::result::Result<HostValue, String>>;

/// Value crossing the host/script boundary.
///
/// Script objects cross only as their [`ObjectKind`]; their contents are
/// never read.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ObjectKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Array,
    Function,
}

impl ObjectKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Plain => "Object",
            Self::Array => "Array",
            Self::Function => "Function",
        }
    }
}

impl HostValue {
    /// Renders the value the way script string conversion would.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => format_number(*value),
            Self::String(value) => value.clone(),
            Self::Object(kind) => format!("[object {}]", kind.tag()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if value == value.trunc() && value.abs() < 1e21 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[derive(Clone)]
pub enum Member {
    Field(HostValue),
    Method { arity: usize, function: HostFunction },
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(value) => f.debug_tuple("Field").field(value).finish(),
            Self::Method { arity, .. } => f.debug_struct("Method").field("arity", arity).finish(),
        }
    }
}

/// Describes one host object bound as a global in a script context.
///
/// The script-visible surface is exactly the declared members; nothing is
/// exposed by reflection. `bootstrap_source`, when present, runs right after
/// the binding succeeds.
#[derive(Debug, Clone)]
pub struct Capability {
    global_name: String,
    members: Vec<(String, Member)>,
    bootstrap_source: Option<String>,
}

impl Capability {
    pub fn new(global_name: impl Into<String>) -> Self {
        Self {
            global_name: global_name.into(),
            members: Vec::new(),
            bootstrap_source: None,
        }
    }

    /// Declares a data field. Redeclaring a name replaces the earlier member.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.push_member(name.into(), Member::Field(value.into()));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, arity: usize, function: F) -> Self
    where
        F: Fn(&[HostValue]) -> std::result::Result<HostValue, String> + 'static,
    {
        self.push_member(
            name.into(),
            Member::Method {
                arity,
                function: Rc::new(function),
            },
        );
        self
    }

    pub fn bootstrap(mut self, source: impl Into<String>) -> Self {
        self.bootstrap_source = Some(source.into());
        self
    }

    pub fn global_name(&self) -> &str {
        &self.global_name
    }

    pub fn members(&self) -> &[(String, Member)] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|(member_name, _)| member_name == name)
            .map(|(_, member)| member)
    }

    /// Bootstrap text, treating an empty string as absent.
    pub fn bootstrap_source(&self) -> Option<&str> {
        self.bootstrap_source
            .as_deref()
            .filter(|source| !source.trim().is_empty())
    }

    fn push_member(&mut self, name: String, member: Member) {
        if let Some(slot) = self
            .members
            .iter_mut()
            .find(|(member_name, _)| *member_name == name)
        {
            slot.1 = member;
        } else {
            self.members.push((name, member));
        }
    }
}
