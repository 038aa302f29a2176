//! Reader and writer for the restricted Motorola S-record subset the
//! monitor speaks: S0 (header), S1 (data), S5 (record count), S9
//! (terminator). Every record is checksum-verified; the terminator must be
//! the exact literal `S9030000FC`.

use std::fmt;
use std::fmt::Write as _;
use std::io;
use std::io::BufRead;
use std::io::Write;

use log::debug;

use crate::Address;
use crate::Memory;

/// The S9 record is fixed: count 3, address 0, checksum 0xFC.
const TERMINATOR: &str = "S9030000FC";

#[derive(Debug)]
pub enum SRecReadError {
    IO(io::Error),
    /// Line too short, or a non-hex digit where one was expected.
    Syntax { line: usize },
    /// The byte sum over count..checksum is not 255 modulo 256.
    Checksum { line: usize },
    /// A record type other than S0/S1/S5/S9.
    UnknownRecord { line: usize },
    /// An S9 record that is not the exact terminator literal.
    BadTerminator { line: usize },
}

impl From<io::Error> for SRecReadError {
    fn from(error: io::Error) -> Self {
        SRecReadError::IO(error)
    }
}

impl fmt::Display for SRecReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SRecReadError::IO(error) => write!(f, "read error ({})", error),
            SRecReadError::Syntax { line } => write!(f, "format error at line {}", line),
            SRecReadError::Checksum { line } => write!(f, "checksum error at line {}", line),
            SRecReadError::UnknownRecord { line } => {
                write!(f, "unknown record type at line {}", line)
            }
            SRecReadError::BadTerminator { line } => {
                write!(f, "malformed S9 terminator at line {}", line)
            }
        }
    }
}

impl std::error::Error for SRecReadError {}

/// Lowest and highest addresses written by the S1 records of a load. A
/// file without S1 records reports 0xFFFF:0x0000.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoadSummary {
    pub first: Address,
    pub last: Address,
}

/// Parses records line by line, writing S1 payloads straight into memory.
/// Bytes written before an error are kept.
pub fn load<R: BufRead, M: Memory>(
    reader: R,
    memory: &mut M,
) -> Result<LoadSummary, SRecReadError> {
    let mut first = Address::new(0xFFFF);
    let mut last = Address::new(0x0000);

    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line?;
        let line = line.trim_end_matches('\r');

        verify_checksum(line, number)?;

        match line.get(..2) {
            Some("S0") | Some("S5") => {}
            Some("S1") => {
                let count = parse_byte(line, 2, number)?;
                let data_len = usize::from(count)
                    .checked_sub(3)
                    .ok_or(SRecReadError::Syntax { line: number })?;
                let address = parse_address(line, 4, number)?;

                for i in 0..data_len {
                    let byte = parse_byte(line, 8 + i * 2, number)?;
                    let target = address + i as u16;
                    memory.write(target, byte);
                    first = first.min(target);
                    last = last.max(target);
                }
                debug!("S1 record: {} bytes at {}", data_len, address);
            }
            Some("S9") => {
                if line != TERMINATOR {
                    return Err(SRecReadError::BadTerminator { line: number });
                }
            }
            _ => return Err(SRecReadError::UnknownRecord { line: number }),
        }
    }

    Ok(LoadSummary { first, last })
}

/// Emits one S0 carrying `name`, S1 rows covering `[start, end]` (the first
/// row starts at `start`, later rows on 16-byte boundaries, the last ends
/// at `end`), an S5 with the S1 record count, and the S9 terminator.
pub fn save<W: Write, M: Memory>(
    mut writer: W,
    memory: &mut M,
    name: &str,
    start: Address,
    end: Address,
) -> io::Result<()> {
    let mut out = String::new();

    push_record(&mut out, '0', 0x0000, name.as_bytes());

    let mut records = 0u16;
    let mut row = start.value();
    loop {
        let row_end = end.value().min((row & 0xFFF0) + 15);
        let data: Vec<u8> = (row..=row_end)
            .map(|addr| memory.read(Address::new(addr)))
            .collect();
        push_record(&mut out, '1', row, &data);
        records += 1;

        if row_end == end.value() {
            break;
        }
        row = row_end + 1;
    }

    push_record(&mut out, '5', records, &[]);
    out.push_str(TERMINATOR);
    out.push('\n');

    writer.write_all(out.as_bytes())?;
    writer.flush()
}

fn push_record(out: &mut String, tag: char, address: u16, data: &[u8]) {
    let count = data.len() as u8 + 3;
    let mut sum = u32::from(count) + u32::from(address >> 8) + u32::from(address & 0xFF);

    let _ = write!(out, "S{}{:02X}{:04X}", tag, count, address);
    for byte in data {
        let _ = write!(out, "{:02X}", byte);
        sum += u32::from(*byte);
    }
    let checksum = !(sum as u8);
    let _ = write!(out, "{:02X}", checksum);
    out.push('\n');
}

fn verify_checksum(line: &str, number: usize) -> Result<(), SRecReadError> {
    let count = parse_byte(line, 2, number)?;

    let mut sum = 0u32;
    for i in 0..=usize::from(count) {
        sum += u32::from(parse_byte(line, 2 + i * 2, number)?);
    }
    if sum % 256 != 255 {
        return Err(SRecReadError::Checksum { line: number });
    }
    Ok(())
}

fn parse_byte(line: &str, index: usize, number: usize) -> Result<u8, SRecReadError> {
    line.get(index..index + 2)
        .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        .ok_or(SRecReadError::Syntax { line: number })
}

fn parse_address(line: &str, index: usize, number: usize) -> Result<Address, SRecReadError> {
    let higher = parse_byte(line, index, number)?;
    let lower = parse_byte(line, index + 2, number)?;
    Ok(Address::from_bytes(higher, lower))
}
