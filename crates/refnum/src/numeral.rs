//
// numeral.rs
//
// Numeral styles for theorem and equation counters
//

use serde::{Deserialize, Serialize};

/// How a counter value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumberStyle {
    #[default]
    #[serde(rename = "arabic")]
    Arabic,
    #[serde(rename = "alph")]
    AlphLower,
    #[serde(rename = "Alph")]
    AlphUpper,
    #[serde(rename = "roman")]
    RomanLower,
    #[serde(rename = "Roman")]
    RomanUpper,
}

impl NumberStyle {
    pub fn format(self, num: u32) -> String {
        match self {
            NumberStyle::Arabic => num.to_string(),
            NumberStyle::AlphLower => to_alph_upper(num).to_lowercase(),
            NumberStyle::AlphUpper => to_alph_upper(num),
            NumberStyle::RomanLower => to_roman_upper(num).to_lowercase(),
            NumberStyle::RomanUpper => to_roman_upper(num),
        }
    }
}

const ROMAN_HUNDREDS: [&str; 10] = ["", "C", "CC", "CCC", "CD", "D", "DC", "DCC", "DCCC", "CM"];
const ROMAN_TENS: [&str; 10] = ["", "X", "XX", "XXX", "XL", "L", "LX", "LXX", "LXXX", "XC"];
const ROMAN_ONES: [&str; 10] = ["", "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX"];

/// Subtractive roman notation. Thousands are written as repeated `M`, so
/// values above 3999 keep growing instead of failing.
pub fn to_roman_upper(num: u32) -> String {
    let thousands = (num / 1000) as usize;
    let mut roman = "M".repeat(thousands);
    roman.push_str(ROMAN_HUNDREDS[(num / 100 % 10) as usize]);
    roman.push_str(ROMAN_TENS[(num / 10 % 10) as usize]);
    roman.push_str(ROMAN_ONES[(num % 10) as usize]);
    roman
}

/// Bijective base-26: 1 -> A, 26 -> Z, 27 -> AA. Zero has no letters.
pub fn to_alph_upper(num: u32) -> String {
    let mut letters = Vec::new();
    let mut n = num;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
