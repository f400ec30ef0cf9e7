use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub struct TaggedError {
    attempt: String,
    source: io::Error,
}

impl TaggedError {
    pub fn new(attempt: impl Into<String>, error: io::Error) -> Self {
        Self {
            attempt: attempt.into(),
            source: error,
        }
    }

    pub fn attempt(&self) -> &str {
        &self.attempt
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

impl fmt::Display for TaggedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attempt, self.source)
    }
}

impl Error for TaggedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InternetChecksum {
    sum: u32,
}

impl InternetChecksum {
    pub fn new(initial_sum: u32) -> Self {
        Self { sum: initial_sum }
    }

    pub fn add(&mut self, data: &[u8]) {
        for chunk in data.chunks(2) {
            let word = if chunk.len() == 2 {
                u16::from_be_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], 0])
            };
            self.sum = self.sum.wrapping_add(word as u32);
        }
    }

    pub fn value(&self) -> u16 {
        let mut sum = self.sum;
        while (sum >> 16) != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !(sum as u16)
    }
}

pub fn hexdump(data: &[u8], indent: usize) -> String {
    let indent_str = " ".repeat(indent);
    let mut output = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        output.push_str(&format!("{}{:08x}: ", indent_str, i * 16));

        for (j, &byte) in chunk.iter().enumerate() {
            if j == 8 {
                output.push(' ');
            }
            output.push_str(&format!("{:02x} ", byte));
        }

        if chunk.len() < 16 {
            let spaces = (16 - chunk.len()) * 3 + if chunk.len() <= 8 { 1 } else { 0 };
            output.push_str(&" ".repeat(spaces));
        }

        output.push(' ');

        for &byte in chunk {
            output.push(if (32..127).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }

        output.push('\n');
    }

    output
}
