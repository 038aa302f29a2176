use std::io;
use std::io::{Read, Write};

/// Character I/O seam for the PUTC/GETC opcodes, so the engine can run
/// against the real terminal or a buffer in tests.
pub trait Console {
    fn put_char(&mut self, byte: u8);
    /// Blocks until one byte is available; end of input reads as 0xFF.
    fn get_char(&mut self) -> u8;
}

/// Unbuffered standard input/output.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn put_char(&mut self, byte: u8) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(&[byte]);
        let _ = stdout.flush();
    }

    fn get_char(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match io::stdin().read(&mut byte) {
            Ok(1) => byte[0],
            _ => 0xFF,
        }
    }
}

/// Scripted console for tests: reads from a canned input, collects output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: Vec<u8>,
    cursor: usize,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn with_input(input: &[u8]) -> Self {
        BufferConsole {
            input: input.to_vec(),
            cursor: 0,
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

impl Console for BufferConsole {
    fn put_char(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn get_char(&mut self) -> u8 {
        let byte = self.input.get(self.cursor).copied().unwrap_or(0xFF);
        self.cursor += 1;
        byte
    }
}

impl<T: Console> Console for &mut T {
    fn put_char(&mut self, byte: u8) {
        T::put_char(self, byte)
    }

    fn get_char(&mut self) -> u8 {
        T::get_char(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_replays_input_and_collects_output() {
        let mut console = BufferConsole::with_input(b"ab");

        assert_eq!(console.get_char(), b'a');
        assert_eq!(console.get_char(), b'b');
        assert_eq!(console.get_char(), 0xFF);

        console.put_char(b'x');
        console.put_char(b'y');
        assert_eq!(console.output(), b"xy");
    }
}
