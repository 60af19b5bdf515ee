pub const PARSE_TREE_EXTENSION: &str = "json";
pub const CONFIG_FILE_NAME: &str = "ago.toml";

// Boolean literals of the language. These are also the only two strings
// the Bool↔String cast accepts.
pub const TRUE_LITERAL: &str = "verum";
pub const FALSE_LITERAL: &str = "falsus";

// These are guesses about how much should be initially allocated for the
// instruction and symbol containers. Rough heuristics from small test
// programs to avoid the worst of the reallocation churn.
pub const MINIMUM_STRING_TABLE_CAPACITY: usize = 64;
pub const STATEMENT_TO_INSTRUCTION_RATIO: usize = 4; // (Maybe) each statement lowers to ~4 instructions
pub const MINIMUM_LIKELY_BINDINGS: usize = 8; // How many stems the smallest common scope will likely hold

use serde::Deserialize;
use std::path::PathBuf;

/// Project manifest (`ago.toml`) read by the driver. All fields optional;
/// the compiler core itself never touches the file system beyond reading
/// the parse tree it is pointed at.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
