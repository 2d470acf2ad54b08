/// # templates
///
/// A template spells out one instruction's encoding as four characters, one
/// per nibble, e.g. `"6xkk"`, `"8xyE"`, `"Annn"`:
///
/// * `0-9`, `a-f` (either case) must match that nibble exactly
/// * `x`, `y` capture a single nibble each, every occurrence on its own
/// * `k` opens a two-nibble capture; the `k` that follows it is absorbed
/// * `n` opens a three-nibble capture; the `n`s that follow are absorbed
///
/// Templates are compiled once into a mask/value pair plus a list of fields,
/// so matching a word is one AND and one compare, and pulling out operands
/// is a shift and a mask per field.
use std::fmt;

use crate::error::{Error, Result};

/// Decoded operand values, left to right in template order.
pub type Operands = Vec<u16>;

/// parse four hex digits (no `0x`) into an instruction word
pub fn parse_word(text: &str) -> Result<u16> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::MalformedInstruction(text.to_string()));
    }
    u16::from_str_radix(text, 16).map_err(|_| Error::MalformedInstruction(text.to_string()))
}

/// One capture group: `width` nibbles ending `shift` bits from the right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Field {
    shift: u8,
    width: u8,
}

impl Field {
    fn extract(&self, word: u16) -> u16 {
        let mask = (1u32 << (4 * self.width)) - 1;
        ((word as u32 >> self.shift) & mask) as u16
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
    mask: u16,
    value: u16,
    fields: Vec<Field>,
}

/// a group that's been opened and may still absorb letters
struct OpenGroup {
    letter: char,
    remaining: usize,
}

impl Template {
    pub fn compile(source: &str) -> Result<Template> {
        let invalid = |reason| Error::InvalidTemplate {
            template: source.to_string(),
            reason,
        };

        let mut mask = 0u16;
        let mut value = 0u16;
        // (start nibble, width) for each capture, in order
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut seen_k = false;
        let mut seen_n = false;
        let mut open: Option<OpenGroup> = None;
        let mut nibble = 0usize;

        for c in source.chars() {
            let c = c.to_ascii_lowercase();

            // absorb into the group we're in the middle of
            if let Some(group) = open.as_mut() {
                if group.letter == c && group.remaining > 0 {
                    group.remaining -= 1;
                    continue;
                }
                open = None;
            }

            let width = match c {
                'x' | 'y' => 1,
                'k' if seen_k => return Err(invalid("k group is not contiguous")),
                'n' if seen_n => return Err(invalid("n group is not contiguous")),
                'k' => {
                    seen_k = true;
                    open = Some(OpenGroup { letter: c, remaining: 1 });
                    2
                }
                'n' => {
                    seen_n = true;
                    open = Some(OpenGroup { letter: c, remaining: 2 });
                    3
                }
                _ => {
                    let digit = c
                        .to_digit(16)
                        .ok_or_else(|| invalid("expected a hex digit or one of x, y, k, n"))?;
                    if nibble >= 4 {
                        return Err(invalid("longer than four nibbles"));
                    }
                    let shift = 4 * (3 - nibble);
                    mask |= 0xF << shift;
                    value |= (digit as u16) << shift;
                    nibble += 1;
                    continue;
                }
            };
            if nibble + width > 4 {
                return Err(invalid("longer than four nibbles"));
            }
            spans.push((nibble, width));
            nibble += width;
        }

        if nibble != 4 {
            return Err(invalid("shorter than four nibbles"));
        }

        let fields = spans
            .into_iter()
            .map(|(start, width)| Field {
                shift: (4 * (4 - start - width)) as u8,
                width: width as u8,
            })
            .collect();

        Ok(Template {
            source: source.to_string(),
            mask,
            value,
            fields,
        })
    }

    /// the text this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// nibble width of each capture, left to right
    pub fn field_widths(&self) -> Vec<u8> {
        self.fields.iter().map(|f| f.width).collect()
    }

    pub fn matches(&self, word: u16) -> bool {
        word & self.mask == self.value
    }

    /// operands of a word already known to match
    pub fn operands(&self, word: u16) -> Operands {
        self.fields.iter().map(|f| f.extract(word)).collect()
    }

    /// match instruction text, yielding its operands on success
    pub fn captures(&self, text: &str) -> Option<Operands> {
        let word = parse_word(text).ok()?;
        if self.matches(word) {
            Some(self.operands(word))
        } else {
            None
        }
    }

    /// a word both templates accept, if there is one
    pub fn overlap(&self, other: &Template) -> Option<u16> {
        let common = self.mask & other.mask;
        if (self.value ^ other.value) & common == 0 {
            Some(self.value | other.value)
        } else {
            None
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
