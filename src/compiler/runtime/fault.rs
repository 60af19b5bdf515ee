//! Fatal runtime error policy.
//!
//! Every runtime library operation that can fail returns
//! `Result<_, RuntimeFault>`. Inside the compiler (constant folding,
//! cast-on-reference of known constants) a fault is converted into a
//! normal compile diagnostic. In a generated program the fault is
//! unrecoverable: the shim prints the diagnostic to stderr and
//! terminates the process with a non-zero status. There is no exception
//! or recovery mechanism in generated programs.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    /// The operation that failed ("divide", "cast to Int", "list get", ...)
    pub operation: String,
    /// What went wrong, naming the offending value or position.
    pub message: String,
}

impl RuntimeFault {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeFault {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Terminate the process the way a generated program does.
    /// Only the native runtime shim calls this; the compiler never does.
    pub fn report_and_exit(&self) -> ! {
        eprintln!("Fatal error in {}: {}", self.operation, self.message);
        std::process::exit(1);
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl std::error::Error for RuntimeFault {}
