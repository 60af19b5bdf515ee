use crate::compiler::parsers::tokens::TextLocation;
use colour::{e_dark_yellow_ln, e_magenta_ln, e_red_ln, e_yellow_ln, grey_ln};
use std::path::Path;

// The final set of errors and warnings emitted from the compiler
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompilerWarning>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        CompilerMessages {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    // The parse tree itself was malformed (bad JSON, missing fields,
    // statements where only expressions are allowed, ...)
    Syntax,

    // An identifier has no recognized type suffix, or a stem was
    // referenced before any declaration
    Resolution,

    // Operator domain violations, bad index tags, impossible casts
    Type,

    // Call arity does not match the function table entry
    Arity,

    // Language rule violations that are not type errors
    // (redeo with a value in a -i function, break outside a loop, ...)
    Rule,

    // File system problems in the driver
    File,

    // Internal compiler bug, not the user's fault
    Compiler,
}

#[derive(Debug)]
pub struct CompileError {
    pub msg: String,
    pub location: TextLocation,
    pub error_type: ErrorType,
}

impl CompileError {
    pub fn new(msg: impl Into<String>, location: TextLocation, error_type: ErrorType) -> Self {
        CompileError {
            msg: msg.into(),
            location,
            error_type,
        }
    }

    pub fn new_syntax_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Syntax)
    }

    pub fn new_resolution_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Resolution)
    }

    pub fn new_type_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Type)
    }

    pub fn new_arity_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Arity)
    }

    pub fn new_rule_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Rule)
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        CompileError {
            msg: format!("{}: {}", path.display(), msg.into()),
            location: TextLocation::default(),
            error_type: ErrorType::File,
        }
    }

    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompileError {
            msg: msg.into(),
            location: TextLocation::default(),
            error_type: ErrorType::Compiler,
        }
    }

    fn heading(&self) -> &'static str {
        match self.error_type {
            ErrorType::Syntax => "Syntax error",
            ErrorType::Resolution => "Name resolution error",
            ErrorType::Type => "Type error",
            ErrorType::Arity => "Arity error",
            ErrorType::Rule => "Rule error",
            ErrorType::File => "File error",
            ErrorType::Compiler => "Internal compiler error",
        }
    }
}

#[derive(Debug)]
pub struct CompilerWarning {
    pub msg: String,
    pub location: TextLocation,
}

impl CompilerWarning {
    pub fn new(msg: impl Into<String>, location: TextLocation) -> Self {
        CompilerWarning {
            msg: msg.into(),
            location,
        }
    }
}

pub fn print_formatted_error(error: &CompileError, source_path: &Path) {
    match error.error_type {
        ErrorType::Compiler => {
            e_magenta_ln!("[{}]", error.heading());
            e_red_ln!("{}", error.msg);
            grey_ln!("This is a bug in the compiler itself. Please report it.");
        }
        ErrorType::File => {
            e_red_ln!("[{}] {}", error.heading(), error.msg);
        }
        _ => {
            e_red_ln!(
                "[{}] {} ({})",
                error.heading(),
                source_path.display(),
                error.location
            );
            e_yellow_ln!("  {}", error.msg);
        }
    }
}

pub fn print_warning(warning: &CompilerWarning, source_path: &Path) {
    e_dark_yellow_ln!(
        "[Warning] {} ({}): {}",
        source_path.display(),
        warning.location,
        warning.msg
    );
}

pub fn print_errors(messages: &CompilerMessages, source_path: &Path) {
    for warning in &messages.warnings {
        print_warning(warning, source_path);
    }
    for error in &messages.errors {
        print_formatted_error(error, source_path);
    }
}
