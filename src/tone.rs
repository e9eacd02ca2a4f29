//! Tone / personality resolution
//!
//! Fixed vocabulary of five communication styles. Resolution is total:
//! explicit request, then remembered preference, then the default.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Zen,
    ToughLove,
    ToThePoint,
    NoBs,
    #[default]
    Supportive,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Zen,
        Tone::ToughLove,
        Tone::ToThePoint,
        Tone::NoBs,
        Tone::Supportive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Zen => "zen",
            Tone::ToughLove => "tough_love",
            Tone::ToThePoint => "to_the_point",
            Tone::NoBs => "no_bs",
            Tone::Supportive => "supportive",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tone::Zen => "Zen",
            Tone::ToughLove => "Tough Love",
            Tone::ToThePoint => "To The Point",
            Tone::NoBs => "No BS",
            Tone::Supportive => "Supportive",
        }
    }

    /// One-line summary of the style.
    pub fn description(&self) -> &'static str {
        match self {
            Tone::Zen => "Calm, mindful, encouraging long-term perspective",
            Tone::ToughLove => "Direct, challenging, pushes you to do better",
            Tone::ToThePoint => "Brief, factual, minimal explanation",
            Tone::NoBs => "Blunt, data-driven, cuts through excuses",
            Tone::Supportive => "Encouraging, educational, builds confidence",
        }
    }

    pub fn catchphrase(&self) -> &'static str {
        match self {
            Tone::Zen => "Let's think about your long-term peace of mind...",
            Tone::ToughLove => "You said you wanted to save. Skip the bag.",
            Tone::ToThePoint => "Here are the facts.",
            Tone::NoBs => "Let's cut to the chase.",
            Tone::Supportive => "I know it's tempting, but you're doing great staying on track!",
        }
    }

    /// Style guidance appended to the handler instruction.
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Zen => {
                "Speak calmly and mindfully. Focus on the bigger picture, avoid urgency \
                 and guide the user toward reflective, peaceful decisions."
            }
            Tone::ToughLove => {
                "Be the friend who tells hard truths. Be direct and challenging, do not \
                 sugarcoat, and push back on excuses constructively."
            }
            Tone::ToThePoint => {
                "Be extremely concise: answer first, in two or three sentences at most, \
                 with no filler."
            }
            Tone::NoBs => {
                "Cut through emotional reasoning and focus on numbers. Be blunt but not \
                 rude and let the data make the point."
            }
            Tone::Supportive => {
                "Be warm and encouraging. Celebrate good decisions, gently guide on poor \
                 ones and end with a clear next step."
            }
        }
    }

    /// Map free-form input onto the vocabulary; `None` for anything unknown.
    pub fn normalize(input: &str) -> Option<Tone> {
        let lowered = input.trim().to_lowercase();

        match lowered.as_str() {
            "zen" | "zen_coach" | "zen coach" | "coach" | "calm" => Some(Tone::Zen),
            "tough_love" | "tough love" | "tough-love" | "tough" | "strict" | "firm" => {
                Some(Tone::ToughLove)
            }
            "to_the_point" | "to the point" | "to-the-point" | "brief" | "concise" => {
                Some(Tone::ToThePoint)
            }
            "no_bs" | "no bs" | "nobs" | "no-nonsense" | "no nonsense" | "direct" | "blunt" => {
                Some(Tone::NoBs)
            }
            "supportive" | "support" | "encouraging" | "kind" => Some(Tone::Supportive),
            _ => None,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct ToneResolver;

impl ToneResolver {
    /// Explicit request beats remembered preference beats the default.
    pub fn resolve(explicit: Option<&str>, remembered: Option<&str>) -> Tone {
        explicit
            .and_then(Tone::normalize)
            .or_else(|| remembered.and_then(Tone::normalize))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms_map_to_canonical_tone() {
        assert_eq!(Tone::normalize("Zen_Coach"), Some(Tone::Zen));
        assert_eq!(Tone::normalize("  tough love "), Some(Tone::ToughLove));
        assert_eq!(Tone::normalize("CONCISE"), Some(Tone::ToThePoint));
        assert_eq!(Tone::normalize("no-nonsense"), Some(Tone::NoBs));
        assert_eq!(Tone::normalize("kind"), Some(Tone::Supportive));
        assert_eq!(Tone::normalize("sarcastic"), None);
        assert_eq!(Tone::normalize(""), None);
    }

    #[test]
    fn test_canonical_ids_round_trip() {
        for tone in Tone::ALL {
            assert_eq!(Tone::normalize(tone.as_str()), Some(tone));
        }
    }

    #[test]
    fn test_resolution_priority() {
        assert_eq!(ToneResolver::resolve(Some("blunt"), Some("zen")), Tone::NoBs);
        assert_eq!(ToneResolver::resolve(None, Some("zen")), Tone::Zen);
        assert_eq!(ToneResolver::resolve(Some("whimsical"), Some("firm")), Tone::ToughLove);
        assert_eq!(ToneResolver::resolve(Some("whimsical"), Some("??")), Tone::Supportive);
        assert_eq!(ToneResolver::resolve(None, None), Tone::Supportive);
    }
}
