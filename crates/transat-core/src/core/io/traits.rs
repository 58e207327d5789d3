use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing one textual file format.
///
/// Implementors describe the in-memory value a file decodes to and the error type
/// of the format; the path-based helpers are provided on top of the reader/writer
/// methods.
pub trait TextFormat {
    /// The value parsed from and serialized to the format.
    type Value;

    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Parses a value from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or reading fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error>;

    /// Serializes a value to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Value, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(value: &Self::Value, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(value, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
