use crate::error::Error;
use crate::paths::PathNormalizer;

/// Characters that change how a POSIX shell parses a line.
pub const CONTROL_CHARACTERS: [char; 9] = [';', '\n', '$', '!', '(', ')', '{', '}', '`'];

/// The command to run inside the container, classified by how the caller
/// passed it on the host command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCommand {
    /// No arguments: start an interactive shell.
    Interactive,
    /// A single argument, already written as shell syntax (`"cmake .. && make"`).
    /// Passed through verbatim.
    Preformatted(String),
    /// Two or more arguments, meant literally. Shell syntax is rejected.
    TokenList(Vec<String>),
}

impl ImageCommand {
    pub fn from_args(mut args: Vec<String>) -> Self {
        match args.len() {
            0 => ImageCommand::Interactive,
            1 => ImageCommand::Preformatted(args.remove(0)),
            _ => ImageCommand::TokenList(args),
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, ImageCommand::Interactive)
    }

    /// Fail if a literal token list contains shell control characters.
    pub fn validate(&self) -> Result<(), Error> {
        if let ImageCommand::TokenList(tokens) = self {
            if let Some(token) = tokens.iter().find(|token| has_control_characters(token)) {
                return Err(Error::ControlCharacters {
                    token: token.clone(),
                });
            }
        }
        Ok(())
    }

    /// Reduce the command to the single line the container shell evaluates.
    pub fn format(&self, normalizer: &PathNormalizer<'_>) -> Result<String, Error> {
        self.validate()?;
        let line = match self {
            ImageCommand::Interactive => String::new(),
            ImageCommand::Preformatted(line) => normalizer.normalize(line),
            ImageCommand::TokenList(tokens) => tokens
                .iter()
                .map(|token| normalizer.normalize(token))
                .collect::<Vec<_>>()
                .join(" "),
        };
        Ok(line)
    }
}

pub fn has_control_characters(token: &str) -> bool {
    token.contains(CONTROL_CHARACTERS.as_slice())
}
