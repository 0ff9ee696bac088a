//! Binary encoding of `ParseTables`.

use crate::tables::{ParseTables, ProductionInfo, EMPTY};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{self, Read, Write};

const MAGIC: &[u8; 4] = b"LPK1";
const VERSION: u16 = 1;

// magic, version, four u16 counts, accept code, group shift, five u32 lengths.
pub(crate) const HEADER_SIZE: usize = 4 + 2 + 2 * 4 + 4 + 1 + 4 * 5;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("I/O error during decoding tables")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),

    #[error("not an encoded parse table")]
    BadMagic,

    #[error("unsupported table format version: {version}")]
    UnsupportedVersion { version: u16 },

    #[error("inconsistent tables: {reason}")]
    Inconsistent { reason: &'static str },
}

impl ParseTables {
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u16::<LE>(VERSION)?;
        w.write_u16::<LE>(self.terminal_count)?;
        w.write_u16::<LE>(self.nonterminal_count)?;
        w.write_u16::<LE>(self.first_value_terminal)?;
        w.write_u16::<LE>(self.error_symbol)?;
        w.write_i32::<LE>(self.accept_code)?;
        w.write_u8(self.group_shift)?;

        w.write_u32::<LE>(self.productions.len() as u32)?;
        for p in &self.productions {
            w.write_u16::<LE>(p.lhs)?;
            w.write_u16::<LE>(p.rhs_len)?;
        }
        w.write_u32::<LE>(self.actions.len() as u32)?;
        for &code in &self.actions {
            w.write_i32::<LE>(code)?;
        }
        w.write_u32::<LE>(self.lookaheads.len() as u32)?;
        for &symbol in &self.lookaheads {
            w.write_u16::<LE>(symbol)?;
        }
        w.write_u32::<LE>(self.offsets.len() as u32)?;
        for &offset in &self.offsets {
            w.write_i32::<LE>(offset)?;
        }
        w.write_u32::<LE>(self.defaults.len() as u32)?;
        for &code in &self.defaults {
            w.write_i32::<LE>(code)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut buf)
            .expect("writing into Vec<u8> never fails");
        buf
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = r.read_u16::<LE>()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let terminal_count = r.read_u16::<LE>()?;
        let nonterminal_count = r.read_u16::<LE>()?;
        let first_value_terminal = r.read_u16::<LE>()?;
        let error_symbol = r.read_u16::<LE>()?;
        let accept_code = r.read_i32::<LE>()?;
        let group_shift = r.read_u8()?;

        let productions = read_vec(&mut r, |r| {
            Ok(ProductionInfo {
                lhs: r.read_u16::<LE>()?,
                rhs_len: r.read_u16::<LE>()?,
            })
        })?;
        let actions = read_vec(&mut r, |r| r.read_i32::<LE>())?;
        let lookaheads = read_vec(&mut r, |r| r.read_u16::<LE>())?;
        let offsets = read_vec(&mut r, |r| r.read_i32::<LE>())?;
        let defaults = read_vec(&mut r, |r| r.read_i32::<LE>())?;

        let tables = Self {
            terminal_count,
            nonterminal_count,
            first_value_terminal,
            error_symbol,
            accept_code,
            productions,
            actions,
            lookaheads,
            group_shift,
            offsets,
            defaults,
        };
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = bytes;
        let tables = Self::read_from(&mut r)?;
        if !r.is_empty() {
            return Err(DecodeError::Inconsistent {
                reason: "trailing bytes after the tables",
            });
        }
        Ok(tables)
    }

    /// Check the structural requirements that `lookup` and `decode` rely on.
    fn validate(&self) -> Result<(), DecodeError> {
        let inconsistent = |reason| Err(DecodeError::Inconsistent { reason });

        let symbol_count = self.symbol_count();
        let state_count = self.state_count();
        if self.terminal_count == 0 || self.nonterminal_count == 0 {
            return inconsistent("missing built-in symbols");
        }
        if self.error_symbol != self.terminal_count {
            return inconsistent("the error symbol must be the first nonterminal");
        }
        if self.first_value_terminal == 0 || self.first_value_terminal > self.terminal_count {
            return inconsistent("first value terminal out of range");
        }
        if self.group_shift > 16 {
            return inconsistent("group shift out of range");
        }
        if self.actions.len() != self.lookaheads.len() {
            return inconsistent("action and lookahead arrays differ in length");
        }
        if self.offsets.len() != state_count * self.group_count() {
            return inconsistent("offset count does not match the state count");
        }

        let valid_code = |code: i32| match code {
            0 => true,
            c if c > 0 => (c as usize) < state_count,
            c => (!c as usize) < self.productions.len(),
        };
        if self.accept_code >= 0 || !valid_code(self.accept_code) {
            return inconsistent("invalid accept code");
        }
        if self.productions.iter().any(|p| {
            (p.lhs as usize) < self.terminal_count as usize || p.lhs as usize >= symbol_count
        }) {
            return inconsistent("production lhs is not a nonterminal");
        }
        if self
            .lookaheads
            .iter()
            .any(|&s| s != EMPTY && s as usize >= symbol_count)
        {
            return inconsistent("lookahead symbol out of range");
        }
        if !self.actions.iter().all(|&c| valid_code(c)) {
            return inconsistent("action code out of range");
        }
        if !self.defaults.iter().all(|&c| c <= 0 && valid_code(c)) {
            return inconsistent("default reduction out of range");
        }
        Ok(())
    }
}

fn read_vec<R, T, F>(r: &mut R, mut f: F) -> Result<Vec<T>, DecodeError>
where
    R: Read,
    F: FnMut(&mut R) -> io::Result<T>,
{
    let len = r.read_u32::<LE>()? as usize;
    // the length is untrusted, so the buffer grows while reading.
    let mut items = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        items.push(f(r)?);
    }
    Ok(items)
}
