// src/morse/mod.rs  —  ITU character table + text send operations

use crate::error::{Error, Result};
use crate::gen::Generator;

/// ITU Morse code table
pub fn char_to_morse(c: char) -> Option<&'static str> {
    match c.to_ascii_uppercase() {
        'A' => Some(".-"),    'B' => Some("-..."),  'C' => Some("-.-."),
        'D' => Some("-.."),   'E' => Some("."),      'F' => Some("..-."),
        'G' => Some("--."),   'H' => Some("...."),   'I' => Some(".."),
        'J' => Some(".---"),  'K' => Some("-.-"),    'L' => Some(".-.."),
        'M' => Some("--"),    'N' => Some("-."),     'O' => Some("---"),
        'P' => Some(".--."),  'Q' => Some("--.-"),   'R' => Some(".-."),
        'S' => Some("..."),   'T' => Some("-"),      'U' => Some("..-"),
        'V' => Some("...-"),  'W' => Some(".--"),    'X' => Some("-..-"),
        'Y' => Some("-.--"),  'Z' => Some("--.."),
        '0' => Some("-----"), '1' => Some(".----"),  '2' => Some("..---"),
        '3' => Some("...--"), '4' => Some("....-"),  '5' => Some("....."),
        '6' => Some("-...."), '7' => Some("--..."),  '8' => Some("---.."),
        '9' => Some("----."),
        '.' => Some(".-.-.-"),',' => Some("--..--"), '?' => Some("..--.."),
        '/' => Some("-..-."), '+' => Some(".-.-."),  '=' => Some("-...-"),
        '-' => Some("-....-"),'@' => Some(".--.-."), '(' => Some("-.--."),
        ')' => Some("-.--.-"),'\'' => Some(".----."),
        _   => None,
    }
}

/// Prosign: text like "<AR>" → dit/dah string sent without inner
/// character gaps
pub fn prosign_to_morse(s: &str) -> Option<&'static str> {
    match s {
        "<AR>" | "+"   => Some(".-.-."),
        "<SK>"         => Some("...-.-"),
        "<KN>"         => Some("-.--."),
        "<BK>"         => Some("-...-.-"),
        "<SOS>"        => Some("...---..."),
        "<HH>"         => Some("........"), // error
        _              => None,
    }
}

impl Generator {
    /// Queue one character: its marks, their inter-mark spaces, and the
    /// end-of-character space.  `QueueFull` against a backlogged queue
    /// means "try again shortly" — playback keeps draining.
    pub fn send_character(&self, c: char) -> Result<()> {
        let code = char_to_morse(c).ok_or(Error::InvalidArgument)?;
        if self.queue().is_backlogged() {
            return Err(Error::QueueFull);
        }
        self.enqueue_representation(code)?;
        self.enqueue_eoc_space()
    }

    /// Queue a whole text.  Whitespace becomes word spacing; words in
    /// angle brackets are sent as prosigns.  Unknown characters are
    /// skipped with a log note rather than failing mid-text.
    pub fn send_text(&self, text: &str) -> Result<()> {
        let words: Vec<&str> = text.split_whitespace().collect();
        for (wi, word) in words.iter().enumerate() {
            if word.starts_with('<') && word.ends_with('>') {
                if let Some(code) = prosign_to_morse(word) {
                    if self.queue().is_backlogged() {
                        return Err(Error::QueueFull);
                    }
                    self.enqueue_representation(code)?;
                    self.enqueue_eoc_space()?;
                } else {
                    log::debug!("unknown prosign {word:?} skipped");
                }
            } else {
                for c in word.chars() {
                    match self.send_character(c) {
                        Ok(()) => {}
                        Err(Error::InvalidArgument) => {
                            log::debug!("unsendable character {c:?} skipped");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            if wi + 1 < words.len() {
                self.enqueue_eow_space()?;
            }
        }
        Ok(())
    }

    /// Queue a bare ".-" style representation, marks and inter-mark
    /// spaces only.
    fn enqueue_representation(&self, code: &str) -> Result<()> {
        for el in code.chars() {
            match el {
                '.' => self.enqueue_dot()?,
                '-' => self.enqueue_dash()?,
                _ => return Err(Error::InvalidArgument),
            }
            self.enqueue_inter_mark_space()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_letters_and_digits() {
        for c in ('A'..='Z').chain('0'..='9') {
            assert!(char_to_morse(c).is_some(), "missing {c}");
        }
        assert_eq!(char_to_morse('S'), Some("..."));
        assert_eq!(char_to_morse('0'), Some("-----"));
        assert_eq!(char_to_morse('s'), Some("..."));
        assert!(char_to_morse('#').is_none());
    }

    #[test]
    fn prosigns_resolve() {
        assert_eq!(prosign_to_morse("<AR>"), Some(".-.-."));
        assert_eq!(prosign_to_morse("<SK>"), Some("...-.-"));
        assert!(prosign_to_morse("<XX>").is_none());
    }
}
