//! Predeclared functions available to every program, plus tracking of which
//! ones a program actually references so only those get emitted.

use log::debug;
use phf::phf_map;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Parameter signature codes (see [`crate::types::Type::code`]).
    pub params: &'static str,
    pub returns: &'static str,
    /// Accepts any number of arguments of any type; no signature check.
    pub variadic: bool,
}

static BUILTINS: phf::Map<&'static str, Builtin> = phf_map! {
    "reads"     => Builtin { params: "",    returns: "s", variadic: false },
    "readi"     => Builtin { params: "",    returns: "i", variadic: false },
    "readn"     => Builtin { params: "",    returns: "n", variadic: false },
    "write"     => Builtin { params: "",    returns: "",  variadic: true  },
    "tointeger" => Builtin { params: "n",   returns: "i", variadic: false },
    "substr"    => Builtin { params: "snn", returns: "s", variadic: false },
    "ord"       => Builtin { params: "si",  returns: "i", variadic: false },
    "chr"       => Builtin { params: "i",   returns: "s", variadic: false },
};

pub fn all() -> impl Iterator<Item = (&'static str, &'static Builtin)> {
    BUILTINS.entries().map(|(name, b)| (*name, b))
}

/// Records referenced builtins; iteration order is sorted by name.
#[derive(Debug, Default)]
pub struct BuiltinUsage {
    used: BTreeSet<&'static str>,
}

impl BuiltinUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a reference to `name`; non-builtin names are ignored.
    pub fn mark(&mut self, name: &str) {
        if let Some((key, _)) = BUILTINS.get_entry(name) {
            if self.used.insert(key) {
                debug!("Builtin '{}' referenced", key);
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.used.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_is_sorted_and_ignores_user_functions() {
        let mut usage = BuiltinUsage::new();
        usage.mark("write");
        usage.mark("main");
        usage.mark("chr");
        usage.mark("write");

        assert_eq!(usage.names(), vec!["chr", "write"]);
    }

    #[test]
    fn write_is_the_only_variadic_builtin() {
        let variadic: Vec<_> = all().filter(|(_, b)| b.variadic).map(|(n, _)| n).collect();
        assert_eq!(variadic, vec!["write"]);
    }
}
