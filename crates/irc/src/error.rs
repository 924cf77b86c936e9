use std::{error::Error, fmt::Display};

use intco::{IntcoError, Simple};
use log::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum IrcError {
    /// the optimization cannot continue
    Opt(String),

    /// something the caller can fix by rebuilding its state, such as
    /// regenerating the coordinates after bends became linear
    Alg {
        msg: String,
        linear_bends: Vec<Simple>,
    },

    /// the root of the secular equation was not found within the iteration
    /// caps
    Convergence {
        phase: &'static str,
        iterations: usize,
    },

    Intco(IntcoError),

    Config(String),
}

impl IrcError {
    /// construct an [IrcError::Opt], logging `msg` at the error level
    pub fn opt(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!("{msg}");
        Self::Opt(msg)
    }

    pub fn alg(msg: impl Into<String>, linear_bends: Vec<Simple>) -> Self {
        let msg = msg.into();
        warn!("{msg}");
        Self::Alg { msg, linear_bends }
    }

    /// whether the caller can reasonably retry after handling the error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Alg { .. } | Self::Convergence { .. })
    }

    /// Returns `true` if the error is [`Convergence`].
    ///
    /// [`Convergence`]: IrcError::Convergence
    #[must_use]
    pub fn is_convergence(&self) -> bool {
        matches!(self, Self::Convergence { .. })
    }
}

impl From<IntcoError> for IrcError {
    fn from(e: IntcoError) -> Self {
        Self::Intco(e)
    }
}

impl Display for IrcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrcError::Alg { msg, linear_bends } if !linear_bends.is_empty() => {
                write!(f, "{msg}:")?;
                for b in linear_bends {
                    write!(f, " {b}")?;
                }
                Ok(())
            }
            _ => write!(f, "{self:?}"),
        }
    }
}

impl Error for IrcError {}
