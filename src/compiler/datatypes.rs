use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The static type carried by an identifier's suffix.
///
/// Ago has no type annotations: every binding's declared type comes from
/// the ending of its name. The whole mapping lives in [SUFFIX_TO_TYPE]
/// so nothing else in the compiler ever does its own suffix matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    String,
    Struct,

    // The dynamic escape hatch. A value of any tag fits,
    // but concrete tags are re-validated on the way back out.
    Any,

    // Homogeneous lists. An AnyList is the only heterogeneous collection.
    IntList,
    FloatList,
    BoolList,
    StringList,
    AnyList,

    Range,
    Function,

    // Only legal as a function name suffix: "this function returns nothing".
    NoReturn,
}

/// Suffix → type, ordered longest suffix first so that greedy matching
/// never mistakes `-aem` for `-a` + garbage. Consulted through
/// [split_identifier]; keep this as the single source of truth.
pub const SUFFIX_TO_TYPE: &[(&str, TypeTag)] = &[
    ("arum", TypeTag::FloatList),
    ("erum", TypeTag::StringList),
    ("aem", TypeTag::IntList),
    ("ium", TypeTag::Any),
    ("uum", TypeTag::AnyList),
    ("ae", TypeTag::Float),
    ("am", TypeTag::Bool),
    ("as", TypeTag::BoolList),
    ("es", TypeTag::String),
    ("a", TypeTag::Int),
    ("e", TypeTag::Range),
    ("i", TypeTag::NoReturn),
    ("o", TypeTag::Function),
    ("u", TypeTag::Struct),
];

/// Split an identifier into its stem and the type its suffix declares.
///
/// The stem must be non-empty: a bare suffix like `a` or `es` is not a
/// valid identifier. Returns None for an unrecognized ending, which is a
/// resolution error at the call site.
pub fn split_identifier(name: &str) -> Option<(&str, TypeTag)> {
    for (suffix, tag) in SUFFIX_TO_TYPE {
        if name.len() > suffix.len() && name.ends_with(suffix) {
            return Some((&name[..name.len() - suffix.len()], *tag));
        }
    }
    None
}

/// All recognized suffixes, for diagnostics.
pub fn valid_suffix_list() -> String {
    let suffixes: Vec<&str> = SUFFIX_TO_TYPE.iter().map(|(s, _)| *s).collect();
    suffixes.join(", ")
}

impl TypeTag {
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            TypeTag::IntList
                | TypeTag::FloatList
                | TypeTag::BoolList
                | TypeTag::StringList
                | TypeTag::AnyList
        )
    }

    /// Element tag of a list type. AnyList elements are Any.
    pub fn element_tag(&self) -> Option<TypeTag> {
        match self {
            TypeTag::IntList => Some(TypeTag::Int),
            TypeTag::FloatList => Some(TypeTag::Float),
            TypeTag::BoolList => Some(TypeTag::Bool),
            TypeTag::StringList => Some(TypeTag::String),
            TypeTag::AnyList => Some(TypeTag::Any),
            _ => None,
        }
    }

    pub fn list_of(element: TypeTag) -> Option<TypeTag> {
        match element {
            TypeTag::Int => Some(TypeTag::IntList),
            TypeTag::Float => Some(TypeTag::FloatList),
            TypeTag::Bool => Some(TypeTag::BoolList),
            TypeTag::String => Some(TypeTag::StringList),
            TypeTag::Any => Some(TypeTag::AnyList),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::Float)
    }

    /// Tags whose values live on the generated program's heap and need an
    /// explicit free when their owning scope ends.
    pub fn is_heap(&self) -> bool {
        self.is_list() || matches!(self, TypeTag::String | TypeTag::Struct)
    }

    /// The suffix that declares this tag (reverse of the table).
    pub fn suffix(&self) -> &'static str {
        for (suffix, tag) in SUFFIX_TO_TYPE {
            if tag == self {
                return suffix;
            }
        }
        unreachable!("every TypeTag has a suffix entry")
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeTag::Int => "Int",
            TypeTag::Float => "Float",
            TypeTag::Bool => "Bool",
            TypeTag::String => "String",
            TypeTag::Struct => "Struct",
            TypeTag::Any => "Any",
            TypeTag::IntList => "IntList",
            TypeTag::FloatList => "FloatList",
            TypeTag::BoolList => "BoolList",
            TypeTag::StringList => "StringList",
            TypeTag::AnyList => "AnyList",
            TypeTag::Range => "Range",
            TypeTag::Function => "Function",
            TypeTag::NoReturn => "NoReturn",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_every_suffix() {
        assert_eq!(split_identifier("xa"), Some(("x", TypeTag::Int)));
        assert_eq!(split_identifier("xae"), Some(("x", TypeTag::Float)));
        assert_eq!(split_identifier("flagam"), Some(("flag", TypeTag::Bool)));
        assert_eq!(split_identifier("nomenes"), Some(("nomen", TypeTag::String)));
        assert_eq!(split_identifier("datau"), Some(("data", TypeTag::Struct)));
        assert_eq!(split_identifier("xium"), Some(("x", TypeTag::Any)));
        assert_eq!(split_identifier("listaem"), Some(("list", TypeTag::IntList)));
        assert_eq!(
            split_identifier("listarum"),
            Some(("list", TypeTag::FloatList))
        );
        assert_eq!(split_identifier("listas"), Some(("list", TypeTag::BoolList)));
        assert_eq!(
            split_identifier("listerum"),
            Some(("list", TypeTag::StringList))
        );
        assert_eq!(split_identifier("listuum"), Some(("list", TypeTag::AnyList)));
        assert_eq!(split_identifier("spane"), Some(("span", TypeTag::Range)));
        assert_eq!(split_identifier("fo"), Some(("f", TypeTag::Function)));
        assert_eq!(split_identifier("cleari"), Some(("clear", TypeTag::NoReturn)));
    }

    #[test]
    fn longest_suffix_wins() {
        // "-aem" must not be read as stem "xa" + "-em" or stem "xae" + "-m"
        assert_eq!(split_identifier("xaem"), Some(("x", TypeTag::IntList)));
        // "-arum" over "-am"/"-a"
        assert_eq!(split_identifier("xarum"), Some(("x", TypeTag::FloatList)));
    }

    #[test]
    fn bare_suffix_is_not_an_identifier() {
        assert_eq!(split_identifier("a"), None);
        assert_eq!(split_identifier("arum"), None);
    }

    #[test]
    fn unrecognized_ending_is_an_error() {
        assert_eq!(split_identifier("xyz"), None);
        assert_eq!(split_identifier(""), None);
    }

    #[test]
    fn list_tags_round_trip_through_element() {
        for tag in [
            TypeTag::IntList,
            TypeTag::FloatList,
            TypeTag::BoolList,
            TypeTag::StringList,
            TypeTag::AnyList,
        ] {
            let elem = tag.element_tag().unwrap();
            assert_eq!(TypeTag::list_of(elem), Some(tag));
        }
    }
}
