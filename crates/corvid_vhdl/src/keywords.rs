//! Identifiers generated code may never use.

/// VHDL-2008 reserved words.
const KEYWORDS: &[&str] = &[
    "abs", "access", "after", "alias", "all", "and", "architecture", "array", "assert", "assume",
    "assume_guarantee", "attribute", "begin", "block", "body", "buffer", "bus", "case",
    "component", "configuration", "constant", "context", "cover", "default", "disconnect",
    "downto", "else", "elsif", "end", "entity", "exit", "fairness", "file", "for", "force",
    "function", "generate", "generic", "group", "guarded", "if", "impure", "in", "inertial",
    "inout", "is", "label", "library", "linkage", "literal", "loop", "map", "mod", "nand", "new",
    "next", "nor", "not", "null", "of", "on", "open", "or", "others", "out", "package",
    "parameter", "port", "postponed", "procedure", "process", "property", "protected", "pure",
    "range", "record", "register", "reject", "release", "rem", "report", "restrict",
    "restrict_guarantee", "return", "rol", "ror", "select", "sequence", "severity", "shared",
    "signal", "sla", "sll", "sra", "srl", "strong", "subtype", "then", "to", "transport", "type",
    "unaffected", "units", "until", "use", "variable", "vmode", "vprop", "vunit", "wait", "when",
    "while", "with", "xnor", "xor",
];

/// Names of the standard and numeric libraries the generated code uses,
/// plus the helper functions it declares.
const LIBRARY_NAMES: &[&str] = &[
    "std", "ieee", "work", "standard", "std_logic_1164", "numeric_std", "std_logic",
    "std_ulogic", "std_logic_vector", "std_ulogic_vector", "unsigned", "signed", "boolean",
    "bit", "bit_vector", "integer", "natural", "positive", "character", "string", "time", "true",
    "false", "now", "resize", "to_integer", "to_unsigned", "to_signed", "shift_left",
    "shift_right", "rotate_left", "rotate_right", "rising_edge", "falling_edge", "to_01",
    "std_match", "cohdl_bool_to_std_logic",
];

/// Returns `true` if `name` (in any letter case) is reserved.
pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str()) || LIBRARY_NAMES.contains(&lower.as_str())
}

/// Every reserved identifier, lowercase.
pub(crate) fn reserved() -> impl Iterator<Item = &'static str> {
    KEYWORDS.iter().chain(LIBRARY_NAMES).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_ignore_case() {
        assert!(is_reserved("Signal"));
        assert!(is_reserved("PROCESS"));
        assert!(is_reserved("resize"));
        assert!(!is_reserved("counter"));
    }
}
