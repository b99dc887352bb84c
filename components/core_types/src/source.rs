//! Stack trace elements.

use std::fmt;

/// One frame of a throwable's backtrace.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     class_name: "demo/Main".to_string(),
///     method_name: "run".to_string(),
///     source_file: Some("Main.java".to_string()),
///     line: Some(12),
///     is_native: false,
/// };
///
/// assert_eq!(frame.to_string(), "demo.Main.run(Main.java:12)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Internal name of the declaring class
    pub class_name: String,
    /// Method name
    pub method_name: String,
    /// Source file attribute of the class, if present
    pub source_file: Option<String>,
    /// Line number mapped from the frame's pc
    pub line: Option<u32>,
    /// Whether the frame belongs to a native method
    pub is_native: bool,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}(",
            self.class_name.replace('/', "."),
            self.method_name
        )?;
        if self.is_native {
            return f.write_str("Native Method)");
        }
        match (&self.source_file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{})", file, line),
            (Some(file), None) => write!(f, "{})", file),
            (None, _) => f.write_str("Unknown Source)"),
        }
    }
}
