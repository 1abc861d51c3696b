// ilbm-cycle - decode IFF images and animate their color cycles
// Copyright (C) 2025  Mathias Panzenböck
// 
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
// 
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
// 
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while decoding, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The file could not be opened or read for a reason other than
    /// running out of data.
    Io,
    /// Bad `FORM` tag, composite size out of bounds or a truncated read.
    MalformedContainer,
    /// A chunk payload of the wrong size, or a chunk larger than what is
    /// left of its container.
    MalformedChunk,
    /// Valid file using something this decoder does not implement.
    Unsupported,
    Allocation,
    /// Byte-run data that does not add up to the declared raster.
    Codec,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Io => "IO error",
            ErrorKind::MalformedContainer => "malformed IFF container",
            ErrorKind::MalformedChunk => "malformed chunk",
            ErrorKind::Unsupported => "unsupported feature",
            ErrorKind::Allocation => "allocation failure",
            ErrorKind::Codec => "byte-run codec error",
        }.fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}", display_message(.message, .cause))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn display_message(message: &str, cause: &Option<Box<dyn std::error::Error + Send + Sync>>) -> String {
    if let Some(cause) = cause {
        format!("{message}: {cause}")
    } else {
        message.to_owned()
    }
}

impl Error {
    #[inline]
    pub fn new<S>(kind: ErrorKind, message: S) -> Self
    where S: Into<String> {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    #[inline]
    pub fn with_cause<S>(kind: ErrorKind, message: S, cause: Box<dyn std::error::Error + Send + Sync>) -> Self
    where S: Into<String> {
        Self {
            kind,
            message: message.into(),
            cause: Some(cause),
        }
    }

    #[inline]
    pub fn malformed_container<S>(message: S) -> Self
    where S: Into<String> {
        Self::new(ErrorKind::MalformedContainer, message)
    }

    #[inline]
    pub fn malformed_chunk<S>(message: S) -> Self
    where S: Into<String> {
        Self::new(ErrorKind::MalformedChunk, message)
    }

    #[inline]
    pub fn unsupported<S>(message: S) -> Self
    where S: Into<String> {
        Self::new(ErrorKind::Unsupported, message)
    }

    #[inline]
    pub fn codec<S>(message: S) -> Self
    where S: Into<String> {
        Self::new(ErrorKind::Codec, message)
    }

    #[inline]
    pub fn allocation(bytes: usize) -> Self {
        Self::new(ErrorKind::Allocation, format!("unable to allocate {bytes} bytes"))
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::with_cause(ErrorKind::MalformedContainer, "truncated file", Box::new(value))
        } else {
            Self::with_cause(ErrorKind::Io, "IO error", Box::new(value))
        }
    }
}
