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

//! Generic walker for `FORM` containers of the Interchange File Format.

use std::{collections::HashMap, fmt::Display, io::Read};

use log::debug;
use serde::{Serialize, Serializer};

use crate::error::{Error, ErrorKind, Result};

/// A four character chunk or form type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    pub const FORM: ChunkId = ChunkId(*b"FORM");
    pub const ILBM: ChunkId = ChunkId(*b"ILBM");
    pub const PBM: ChunkId = ChunkId(*b"PBM ");
    pub const BMHD: ChunkId = ChunkId(*b"BMHD");
    pub const CMAP: ChunkId = ChunkId(*b"CMAP");
    pub const CRNG: ChunkId = ChunkId(*b"CRNG");
    pub const BODY: ChunkId = ChunkId(*b"BODY");
}

impl Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for ChunkId {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.collect_str(self)
    }
}

pub const HEADER_SIZE: usize = 12;
pub const CHUNK_HEADER_SIZE: u32 = 8;
pub const MIN_FORM_SIZE: u32 = 4;
pub const MAX_FORM_SIZE: u32 = 16 * 1024 * 1024;

/// Called with the decode state and the complete chunk payload.
pub type ChunkHandler<S> = fn(&mut S, &[u8]) -> Result<()>;

/// Called for chunks that have no handler of their own.
pub type FallbackHandler<S> = fn(&mut S, ChunkId, &[u8]) -> Result<()>;

/// Which form types are accepted and who handles which chunk.
///
/// A handler registered under an accepted form type is invoked once with
/// an empty payload right after the container header was validated.
pub struct ParseRules<S> {
    form_types: Vec<ChunkId>,
    handlers: HashMap<ChunkId, ChunkHandler<S>>,
    fallback: Option<FallbackHandler<S>>,
}

impl<S> Default for ParseRules<S> {
    #[inline]
    fn default() -> Self {
        Self {
            form_types: Vec::new(),
            handlers: HashMap::new(),
            fallback: None,
        }
    }
}

impl<S> ParseRules<S> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn accept(mut self, form_type: ChunkId) -> Self {
        self.form_types.push(form_type);
        self
    }

    #[inline]
    pub fn handler(mut self, id: ChunkId, handler: ChunkHandler<S>) -> Self {
        self.handlers.insert(id, handler);
        self
    }

    #[inline]
    pub fn with_fallback(mut self, fallback: FallbackHandler<S>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[inline]
    pub fn form_types(&self) -> &[ChunkId] {
        &self.form_types
    }

    #[inline]
    pub fn accepts(&self, form_type: ChunkId) -> bool {
        self.form_types.contains(&form_type)
    }
}

#[derive(Debug)]
struct ParseContext<'a, R> {
    reader: &'a mut R,
    bytes_left: u32,
}

impl<R: Read> ParseContext<'_, R> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Err(err) = self.reader.read_exact(buf) {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(Error::with_cause(
                    ErrorKind::MalformedContainer,
                    format!("unable to read {} bytes", buf.len()),
                    Box::new(err)));
            }
            return Err(err.into());
        }

        self.bytes_left -= buf.len() as u32;
        Ok(())
    }

    fn read_chunk_header(&mut self) -> Result<(ChunkId, u32)> {
        if self.bytes_left < CHUNK_HEADER_SIZE {
            return Err(Error::malformed_container(format!(
                "malformed IFF file: {} trailing bytes are too few for a chunk header",
                self.bytes_left)));
        }

        let mut header = [0u8; CHUNK_HEADER_SIZE as usize];
        self.read_bytes(&mut header)?;

        let id = ChunkId([header[0], header[1], header[2], header[3]]);
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        debug!("encountered chunk {id}, size {size}");

        if size > self.bytes_left {
            return Err(Error::malformed_chunk(format!(
                "invalid IFF chunk header: {id} chunk of {size} bytes exceeds the {} bytes left in the FORM",
                self.bytes_left)));
        }

        Ok((id, size))
    }

    fn read_chunk_data(&mut self, size: u32) -> Result<Vec<u8>> {
        let size = size as usize;
        let mut buffer = Vec::new();
        if buffer.try_reserve_exact(size).is_err() {
            return Err(Error::allocation(size));
        }
        buffer.resize(size, 0);
        self.read_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn skip_pad(&mut self, size: u32) -> Result<()> {
        if size & 1 != 0 && self.bytes_left > 0 {
            let mut pad = [0u8; 1];
            self.read_bytes(&mut pad)?;
        }
        Ok(())
    }
}

/// Container header of an IFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormHeader {
    pub size: u32,
    pub form_type: ChunkId,
}

impl FormHeader {
    pub fn parse(header: &[u8; HEADER_SIZE]) -> Result<Self> {
        let tag = ChunkId([header[0], header[1], header[2], header[3]]);
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let form_type = ChunkId([header[8], header[9], header[10], header[11]]);

        if tag != ChunkId::FORM {
            return Err(Error::malformed_container(format!("invalid IFF header: expected FORM, found {tag}")));
        }

        if !(MIN_FORM_SIZE..=MAX_FORM_SIZE).contains(&size) {
            return Err(Error::malformed_container(format!(
                "invalid IFF header: FORM size {size} is outside of {MIN_FORM_SIZE}..={MAX_FORM_SIZE}")));
        }

        Ok(Self { size, form_type })
    }
}

/// Walk all chunks of a `FORM` and dispatch them according to `rules`.
///
/// Chunks without handler are skipped. The first failure, be it a short
/// read, an oversized chunk or a handler returning an error, aborts the
/// whole walk.
pub fn parse_iff<R, S>(reader: &mut R, rules: &ParseRules<S>, state: &mut S) -> Result<FormHeader>
where R: Read {
    let mut header = [0u8; HEADER_SIZE];
    if let Err(err) = reader.read_exact(&mut header) {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(Error::with_cause(
                ErrorKind::MalformedContainer,
                format!("unable to read {HEADER_SIZE} bytes"),
                Box::new(err)));
        }
        return Err(err.into());
    }

    let form = FormHeader::parse(&header)?;
    if !rules.accepts(form.form_type) {
        return Err(Error::malformed_container(format!("unsupported FORM type: {}", form.form_type)));
    }

    debug!("FORM {}, size {}", form.form_type, form.size);

    if let Some(handler) = rules.handlers.get(&form.form_type) {
        handler(state, &[])?;
    }

    let mut context = ParseContext {
        reader,
        bytes_left: form.size - MIN_FORM_SIZE,
    };

    while context.bytes_left > 0 {
        let (id, size) = context.read_chunk_header()?;
        let buffer = context.read_chunk_data(size)?;

        // form type handlers run once, for the header only
        let handler = if rules.accepts(id) { None } else { rules.handlers.get(&id) };

        if let Some(handler) = handler {
            handler(state, &buffer)?;
        } else if let Some(fallback) = rules.fallback {
            fallback(state, id, &buffer)?;
        } else {
            debug!("no handler for chunk {id}, ignoring it");
        }

        drop(buffer);
        context.skip_pad(size)?;
    }

    Ok(form)
}

/// [`parse_iff`], reporting a failure to `error_sink` before returning it.
pub fn parse_iff_with_sink<R, S, F>(reader: &mut R, rules: &ParseRules<S>, state: &mut S, mut error_sink: F) -> Result<FormHeader>
where R: Read, F: FnMut(&str) {
    parse_iff(reader, rules, state).inspect_err(|err| error_sink(&err.to_string()))
}
