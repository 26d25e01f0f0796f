//! Call signatures of native overloads.

use std::fmt;
use std::ops::RangeInclusive;

use bitflags::bitflags;

bitflags! {
    /// Direction of a native parameter.
    ///
    /// Input parameters are decoded from host arguments; output parameters
    /// are encoded into the call's result. In/out parameters are both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u8 {
        const INPUT = 1 << 0;
        const OUTPUT = 1 << 1;
        const IN_OUT = Self::INPUT.bits() | Self::OUTPUT.bits();
    }
}

/// One native parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub flags: ParamFlags,
    /// Whether the native side has a default, making the host argument
    /// optional and settable by keyword.
    pub optional: bool,
}

impl Param {
    /// Mandatory input.
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: ParamFlags::INPUT,
            optional: false,
        }
    }

    /// Input with a native default.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::input(name)
        }
    }

    /// Output-only parameter; never read from the host.
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: ParamFlags::OUTPUT,
            optional: false,
        }
    }

    /// Mandatory input that is also returned.
    pub fn in_out(name: impl Into<String>) -> Self {
        Self {
            flags: ParamFlags::IN_OUT,
            ..Self::input(name)
        }
    }

    pub fn is_input(&self) -> bool {
        self.flags.contains(ParamFlags::INPUT)
    }

    pub fn is_output(&self) -> bool {
        self.flags.contains(ParamFlags::OUTPUT)
    }
}

/// Signature of one overload candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Input parameters in positional order.
    pub fn inputs(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.is_output())
    }

    /// Accepted number of positional arguments.
    pub fn arity(&self) -> RangeInclusive<usize> {
        let mandatory = self.inputs().filter(|p| !p.optional).count();
        mandatory..=self.inputs().count()
    }

    /// Positional slot of the input parameter `name`.
    pub fn input_position(&self, name: &str) -> Option<usize> {
        self.inputs().position(|p| p.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&Param> {
        self.inputs().find(|p| p.name == name)
    }
}

impl fmt::Display for Signature {
    /// Renders `name(a, b=..., out c)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if !param.is_input() {
                f.write_str("out ")?;
            }
            f.write_str(&param.name)?;
            if param.optional {
                f.write_str("=...")?;
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind_test1() -> Signature {
        Signature::new(
            "bindTest1",
            [
                Param::input("a"),
                Param::in_out("b"),
                Param::output("c"),
                Param::optional("d"),
                Param::optional("e"),
            ],
        )
    }

    #[test]
    fn display_marks_optional_and_output() {
        assert_eq!(
            bind_test1().to_string(),
            "bindTest1(a, b, out c, d=..., e=...)"
        );
    }

    #[test]
    fn arity_counts_inputs_only() {
        assert_eq!(bind_test1().arity(), 2..=4);
        assert_eq!(Signature::new("f", []).arity(), 0..=0);
    }

    #[test]
    fn positions_skip_outputs() {
        let sig = bind_test1();
        assert_eq!(sig.input_position("b"), Some(1));
        assert_eq!(sig.input_position("d"), Some(2));
        assert_eq!(sig.input_position("c"), None);
        assert_eq!(sig.outputs().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["b", "c"]);
    }
}
