use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// ARPAbet code to IPA glyph. Affricates and diphthongs use a tie bar.
const ARPABET_TO_IPA: &[(&str, &str)] = &[
    ("P", "p"),
    ("B", "b"),
    ("M", "m"),
    ("W", "w"),
    ("F", "f"),
    ("V", "v"),
    ("DH", "ð"),
    ("TH", "θ"),
    ("T", "t"),
    ("D", "d"),
    ("S", "s"),
    ("Z", "z"),
    ("N", "n"),
    ("L", "l"),
    ("DX", "ɾ"),
    ("CH", "t͡ʃ"),
    ("JH", "d͡ʒ"),
    ("SH", "ʃ"),
    ("ZH", "ʒ"),
    ("R", "ɹ"),
    ("Y", "j"),
    ("K", "k"),
    ("G", "ɡ"),
    ("NG", "ŋ"),
    ("HH", "h"),
    ("IY", "i"),
    ("UW", "u"),
    ("IH", "ɪ"),
    ("UH", "ʊ"),
    ("EH", "ɛ"),
    ("EY", "e͡ɪ"),
    ("AH", "ʌ"),
    ("AO", "ɔ"),
    ("OY", "ɔ͡ɪ"),
    ("OW", "o͡ʊ"),
    ("AE", "æ"),
    ("AW", "a͡ʊ"),
    ("AY", "a͡ɪ"),
    ("AA", "ɑ"),
    ("ER", "ɝ"),
];

/// Display notation for phoneme tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notation {
    #[default]
    Ipa,
    Arpabet,
}

impl Notation {
    pub const ALL: &'static [Notation] = &[Notation::Ipa, Notation::Arpabet];

    pub fn as_str(self) -> &'static str {
        match self {
            Notation::Ipa => "ipa",
            Notation::Arpabet => "arpabet",
        }
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Notation {
    type Err = std::convert::Infallible;

    /// `"ipa"` selects IPA; any other mode name renders ARPAbet.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ipa") {
            Ok(Notation::Ipa)
        } else {
            Ok(Notation::Arpabet)
        }
    }
}

/// Token input for [`render`]. A single string is a one-token sequence;
/// a missing or empty string is an empty one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tokens<'a>(Vec<&'a str>);

impl<'a> From<&'a str> for Tokens<'a> {
    fn from(token: &'a str) -> Self {
        if token.is_empty() {
            Tokens(Vec::new())
        } else {
            Tokens(vec![token])
        }
    }
}

impl<'a> From<Option<&'a str>> for Tokens<'a> {
    fn from(token: Option<&'a str>) -> Self {
        token.map(Tokens::from).unwrap_or_default()
    }
}

impl<'a, 'b> From<&'b [&'a str]> for Tokens<'a> {
    fn from(tokens: &'b [&'a str]) -> Self {
        Tokens(tokens.to_vec())
    }
}

impl<'a, 'b, const N: usize> From<&'b [&'a str; N]> for Tokens<'a> {
    fn from(tokens: &'b [&'a str; N]) -> Self {
        Tokens(tokens.to_vec())
    }
}

impl<'a> From<&'a [String]> for Tokens<'a> {
    fn from(tokens: &'a [String]) -> Self {
        Tokens(tokens.iter().map(String::as_str).collect())
    }
}

impl<'a> From<&'a Vec<String>> for Tokens<'a> {
    fn from(tokens: &'a Vec<String>) -> Self {
        Tokens::from(tokens.as_slice())
    }
}

/// Renders phoneme tokens in the requested notation.
///
/// IPA looks each token up in the ARPAbet table, passes unknown tokens
/// through, and concatenates without a separator. ARPAbet joins the tokens
/// with single spaces.
pub fn render<'a>(tokens: impl Into<Tokens<'a>>, notation: Notation) -> String {
    let Tokens(tokens) = tokens.into();
    match notation {
        Notation::Ipa => tokens.iter().map(|t| to_ipa(t)).collect(),
        Notation::Arpabet => tokens.join(" "),
    }
}

/// Renders a whole transcript whose tokens are separated by whitespace.
pub fn render_transcript(transcript: &str, notation: Notation) -> String {
    let tokens: Vec<&str> = transcript.split_whitespace().collect();
    render(tokens.as_slice(), notation)
}

fn to_ipa(token: &str) -> &str {
    ARPABET_TO_IPA
        .iter()
        .find(|(code, _)| *code == token)
        .map(|(_, glyph)| *glyph)
        .unwrap_or(token)
}
