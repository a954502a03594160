//! Delimiter framing and text encodings.
//!
//! The codec is pure: it splits an accumulated byte buffer into
//! complete frames, leaving at most one undelimited tail behind, and
//! converts frames to and from text.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Text encoding used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin1",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, FrameError> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| FrameError::Decode {
                encoding: self.name(),
                reason: e.utf8_error().to_string(),
            }),
            Encoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(at) => Err(FrameError::Decode {
                    encoding: self.name(),
                    reason: format!("byte 0x{:02x} at offset {at} is out of range", bytes[at]),
                }),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, FrameError> {
        let limit = match self {
            Encoding::Utf8 => return Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => 0x7f,
            Encoding::Latin1 => 0xff,
        };

        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or_else(|| FrameError::Encode {
                        encoding: self.name(),
                        reason: format!("character {c:?} is out of range"),
                    })
            })
            .collect()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(FrameError::UnknownEncoding(other.to_string())),
        }
    }
}

/// Splits a byte stream on a fixed delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCodec {
    delimiter: Vec<u8>,
    encoding: Encoding,
}

impl LineCodec {
    pub fn new(delimiter: &str, encoding: Encoding) -> Result<Self, FrameError> {
        let delimiter = encoding.encode(delimiter)?;
        if delimiter.is_empty() {
            return Err(FrameError::InvalidDelimiter);
        }
        Ok(Self {
            delimiter,
            encoding,
        })
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Remove every delimiter-terminated frame from the front of `buf`.
    ///
    /// Frames are returned without their delimiter. Whatever follows the
    /// last delimiter stays in `buf`.
    pub fn split_frames(&self, buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut start = 0;

        while let Some(pos) = find(&buf[start..], &self.delimiter) {
            frames.push(buf[start..start + pos].to_vec());
            start += pos + self.delimiter.len();
        }

        buf.drain(..start);
        frames
    }

    /// Decode a frame and trim surrounding whitespace.
    pub fn decode(&self, frame: &[u8]) -> Result<String, FrameError> {
        let text = self.encoding.decode(frame)?;
        Ok(text.trim().to_string())
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, FrameError> {
        self.encoding.encode(text)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Framing settings shared by every connection of a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    codec: LineCodec,
    terminator: String,
}

impl Framing {
    pub fn new(delimiter: &str, terminator: &str, encoding: Encoding) -> Result<Self, FrameError> {
        let codec = LineCodec::new(delimiter, encoding)?;
        // Reject terminators the encoding cannot carry up front.
        encoding.encode(terminator)?;
        Ok(Self {
            codec,
            terminator: terminator.to_string(),
        })
    }

    pub fn codec(&self) -> &LineCodec {
        &self.codec
    }

    /// Appended to every outgoing message.
    pub fn terminator(&self) -> &str {
        &self.terminator
    }
}

impl Default for Framing {
    /// `\n`-delimited UTF-8 in, `\r\n`-terminated out.
    fn default() -> Self {
        Self {
            codec: LineCodec {
                delimiter: b"\n".to_vec(),
                encoding: Encoding::Utf8,
            },
            terminator: "\r\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> LineCodec {
        LineCodec::new("\n", Encoding::Utf8).unwrap()
    }

    #[test]
    fn split_keeps_incomplete_tail() {
        let codec = lines();
        let mut buf = b"1 + 1\n2 * 3\n4 /".to_vec();

        let frames = codec.split_frames(&mut buf);

        assert_eq!(frames, vec![b"1 + 1".to_vec(), b"2 * 3".to_vec()]);
        assert_eq!(buf, b"4 /".to_vec());
    }

    #[test]
    fn split_without_delimiter_yields_nothing() {
        let codec = lines();
        let mut buf = b"partial".to_vec();
        assert!(codec.split_frames(&mut buf).is_empty());
        assert_eq!(buf, b"partial".to_vec());
    }

    #[test]
    fn split_handles_empty_frames() {
        let codec = lines();
        let mut buf = b"\n\nx\n".to_vec();
        let frames = codec.split_frames(&mut buf);
        assert_eq!(frames, vec![Vec::new(), Vec::new(), b"x".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn multi_byte_delimiter() {
        let codec = LineCodec::new("\r\n", Encoding::Utf8).unwrap();
        let mut buf = b"a\rb\r\nc\r".to_vec();

        let frames = codec.split_frames(&mut buf);
        assert_eq!(frames, vec![b"a\rb".to_vec()]);
        assert_eq!(buf, b"c\r".to_vec());

        buf.extend_from_slice(b"\n");
        assert_eq!(codec.split_frames(&mut buf), vec![b"c".to_vec()]);
    }

    #[test]
    fn decode_trims_whitespace() {
        let codec = lines();
        assert_eq!(codec.decode(b"  2 + 2 \r").unwrap(), "2 + 2");
        assert_eq!(codec.decode(b"\x03").unwrap(), "\u{3}");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = lines().decode(b"\xff\xfe").unwrap_err();
        assert!(matches!(err, FrameError::Decode { encoding: "utf8", .. }));
    }

    #[test]
    fn ascii_round_trip_and_rejection() {
        assert_eq!(Encoding::Ascii.decode(b"abc").unwrap(), "abc");
        assert!(Encoding::Ascii.decode(b"\xe9").is_err());
        assert!(Encoding::Ascii.encode("é").is_err());
        assert_eq!(Encoding::Ascii.encode("ok").unwrap(), b"ok".to_vec());
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        assert_eq!(Encoding::Latin1.decode(b"caf\xe9").unwrap(), "café");
        assert_eq!(Encoding::Latin1.encode("café").unwrap(), b"caf\xe9".to_vec());
        assert!(Encoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn encoding_from_str_aliases() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("us-ascii".parse::<Encoding>().unwrap(), Encoding::Ascii);
        assert_eq!("iso-8859-1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!(matches!(
            "ebcdic".parse::<Encoding>(),
            Err(FrameError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        assert!(matches!(
            LineCodec::new("", Encoding::Utf8),
            Err(FrameError::InvalidDelimiter)
        ));
    }

    #[test]
    fn framing_defaults() {
        let framing = Framing::default();
        assert_eq!(framing.codec().delimiter(), b"\n");
        assert_eq!(framing.codec().encoding(), Encoding::Utf8);
        assert_eq!(framing.terminator(), "\r\n");
        assert_eq!(framing, Framing::new("\n", "\r\n", Encoding::Utf8).unwrap());
    }

    #[test]
    fn framing_rejects_unencodable_terminator() {
        assert!(Framing::new("\n", "→", Encoding::Ascii).is_err());
    }
}
