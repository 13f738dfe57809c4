//! Domain error types.

/// Rule compilation errors. Both variants carry the character offset into the
/// rule text; nothing about a rule can fail at evaluation time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("unknown reference '{name}' at position {position}")]
    UnknownReference { name: String, position: usize },
}

impl CompileError {
    pub fn position(&self) -> usize {
        match self {
            CompileError::Syntax { position, .. } => *position,
            CompileError::UnknownReference { position, .. } => *position,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position()) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for stratsim.
#[derive(Debug, thiserror::Error)]
pub enum StratsimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleCompile(#[from] CompileError),

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratsimError> for std::process::ExitCode {
    fn from(err: &StratsimError) -> Self {
        let code: u8 = match err {
            StratsimError::Io(_) => 1,
            StratsimError::ConfigParse { .. }
            | StratsimError::ConfigMissing { .. }
            | StratsimError::ConfigInvalid { .. } => 2,
            StratsimError::Data { .. } => 3,
            StratsimError::RuleCompile(_) => 4,
            StratsimError::NoData { .. } | StratsimError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = CompileError::Syntax {
            message: "expected ')'".into(),
            position: 7,
        };
        assert_eq!(err.to_string(), "syntax error at position 7: expected ')'");
    }

    #[test]
    fn unknown_reference_display() {
        let err = CompileError::UnknownReference {
            name: "pric".into(),
            position: 0,
        };
        assert!(err.to_string().contains("pric"));
    }

    #[test]
    fn display_with_context_caret_position() {
        let err = CompileError::Syntax {
            message: "expected number".into(),
            position: 4,
        };
        let rendered = err.display_with_context("abc!def");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "abc!def");
        assert_eq!(lines[1], "    ^");
    }

    #[test]
    fn exit_code_mapping() {
        let err = StratsimError::ConfigMissing {
            section: "backtest".into(),
            key: "initial_capital".into(),
        };
        let code: std::process::ExitCode = (&err).into();
        assert_eq!(format!("{:?}", code), format!("{:?}", std::process::ExitCode::from(2)));
    }

    #[test]
    fn insufficient_data_message() {
        let err = StratsimError::InsufficientData {
            code: "AAPL".into(),
            bars: 10,
            minimum: 27,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for AAPL: have 10 bars, need 27"
        );
    }
}
