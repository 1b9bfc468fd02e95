/*
 * Version serials identify saved snapshots of a stencil. A serial is six digits
 * (`YYMMDD`, the UTC save date) followed by one uppercase letter that
 * disambiguates saves made on the same day, e.g. `250913A`. Because the format
 * is fixed-width, plain lexicographic order of serials is also their
 * chronological order, which is what `Ord` on `Serial` relies on.
 */
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::Date;

pub const SERIAL_LENGTH: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    InvalidFormat(String),
    Exhausted(String),
}

impl std::fmt::Display for SerialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerialError::InvalidFormat(s) => write!(
                f,
                "Invalid serial '{s}': expected 6 digits followed by one uppercase letter"
            ),
            SerialError::Exhausted(prefix) => {
                write!(f, "No serial letters left for date prefix {prefix}")
            }
        }
    }
}

impl std::error::Error for SerialError {}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

impl Serial {
    pub fn parse(text: &str) -> Result<Serial, SerialError> {
        let bytes = text.as_bytes();
        let well_formed = bytes.len() == SERIAL_LENGTH
            && bytes[..6].iter().all(u8::is_ascii_digit)
            && bytes[6].is_ascii_uppercase();
        if well_formed {
            Ok(Serial(text.to_string()))
        } else {
            Err(SerialError::InvalidFormat(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn date_prefix(&self) -> &str {
        &self.0[..6]
    }

    fn letter(&self) -> u8 {
        self.0.as_bytes()[6]
    }

    pub fn prefix_for_date(date: Date) -> String {
        format!(
            "{:02}{:02}{:02}",
            date.year().rem_euclid(100),
            u8::from(date.month()),
            date.day()
        )
    }

    /*
     * Proposes the serial for a save made on `date`. The letter is the first one
     * after the highest letter already used for that date, starting at `A`.
     * Existing serials for other dates do not influence the result.
     */
    pub fn next_for_date(date: Date, existing: &[Serial]) -> Result<Serial, SerialError> {
        let prefix = Self::prefix_for_date(date);
        let highest = existing
            .iter()
            .filter(|s| s.date_prefix() == prefix)
            .map(Serial::letter)
            .max();
        let letter = match highest {
            None => b'A',
            Some(b'Z') => return Err(SerialError::Exhausted(prefix)),
            Some(l) => l + 1,
        };
        Ok(Serial(format!("{prefix}{}", letter as char)))
    }
}

impl TryFrom<String> for Serial {
    type Error = SerialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Serial::parse(&value)
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

impl FromStr for Serial {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Serial::parse(s)
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
