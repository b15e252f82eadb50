use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LispError {
    /// Malformed source text at the given byte offset.
    Read { message: String, offset: usize },
    TypeError { expected: String, got: String },
    UndefinedSymbol(String),
    Arity { name: String, expected: String, got: usize },
    DivisionByZero,
    NotCallable(String),
    /// The host did not offer the capability evaluated code asked for.
    Unavailable(&'static str),
    /// Raised by `throw`.
    Thrown(String),
    StackOverflow,
    Custom(String),
}

impl LispError {
    /// Short name of the error kind, used as the prefix of full errors.
    pub fn kind(&self) -> &'static str {
        match self {
            LispError::Read { .. } => "ReadError",
            LispError::TypeError { .. } => "TypeError",
            LispError::UndefinedSymbol(_) => "UndefinedSymbol",
            LispError::Arity { .. } => "ArityError",
            LispError::DivisionByZero => "ArithmeticError",
            LispError::NotCallable(_) => "TypeError",
            LispError::Unavailable(_) => "HostError",
            LispError::Thrown(_) => "Exception",
            LispError::StackOverflow => "StackOverflow",
            LispError::Custom(_) => "Error",
        }
    }
}

impl fmt::Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LispError::Read { message, offset } => {
                write!(f, "read error at offset {}: {}", offset, message)
            }
            LispError::TypeError { expected, got } => {
                write!(f, "type error: expected {}, got {}", expected, got)
            }
            LispError::UndefinedSymbol(name) => {
                write!(f, "unable to resolve symbol: {}", name)
            }
            LispError::Arity { name, expected, got } => {
                write!(
                    f,
                    "wrong number of args ({}) passed to {}, expected {}",
                    got, name, expected
                )
            }
            LispError::DivisionByZero => write!(f, "divide by zero"),
            LispError::NotCallable(what) => write!(f, "{} cannot be called", what),
            LispError::Unavailable(capability) => {
                write!(f, "{} is not available here", capability)
            }
            LispError::Thrown(message) => write!(f, "{}", message),
            LispError::StackOverflow => write!(f, "stack overflow"),
            LispError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for LispError {}
