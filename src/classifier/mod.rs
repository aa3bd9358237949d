//! Line classification: raw chat line in, colored markup out.
//!
//! Classification is an ordered table of [`Rule`]s evaluated first-match-wins.
//! The table order is significant: several game messages satisfy more than
//! one predicate (a goods transfer that also mentions a dollar amount, a
//! radio line that also contains "says") and the earlier rule owns them.
//!
//! Literal markers ("says", "[INFO]", "intercom", ...) are found once per
//! line with an Aho-Corasick automaton so that predicates are cheap bit tests
//! for the common case and only the matching rule runs its regexes.

pub mod rules;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

pub use rules::Rule;

/// Settings that influence classification of every line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Local character name; empty or `None` means "not configured"
    pub character_name: Option<String>,
    /// When set, every speaker is treated as the local character
    pub name_coloring_disabled: bool,
}

impl ClassifyContext {
    pub fn new(character_name: Option<&str>) -> Self {
        Self {
            character_name: character_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            name_coloring_disabled: false,
        }
    }

    /// Whether `speaker` refers to the local character (case-insensitive).
    pub fn is_own(&self, speaker: &str) -> bool {
        if self.name_coloring_disabled {
            return true;
        }
        match &self.character_name {
            Some(name) => speaker.to_lowercase().contains(&name.to_lowercase()),
            None => false,
        }
    }
}

/// Literal substrings the rules key on (matched case-insensitively).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Marker {
    Says,
    Shouts,
    Whispers,
    Low,
    Lower,
    Phone,
    Info,
    Sms,
    Intercom,
    Vessel,
    Cashtap,
    Bank,
    DrugLab,
    CharacterKill,
    CharacterKilled,
    Robbery,
    Jail,
    Jailed,
    ReleasedFromJail,
    Property,
    Advertisement,
    Ad,
    Government,
    Gov,
    News,
    WeazelNews,
    Admin,
    AdminOoc,
    Report,
    Support,
    Vehicle,
    YourVehicle,
    Weapon,
    Equipped,
    Help,
    Usage,
    Error,
    EmergencyCall,
    Call911,
}

impl Marker {
    pub const ALL: [Marker; 39] = [
        Marker::Says,
        Marker::Shouts,
        Marker::Whispers,
        Marker::Low,
        Marker::Lower,
        Marker::Phone,
        Marker::Info,
        Marker::Sms,
        Marker::Intercom,
        Marker::Vessel,
        Marker::Cashtap,
        Marker::Bank,
        Marker::DrugLab,
        Marker::CharacterKill,
        Marker::CharacterKilled,
        Marker::Robbery,
        Marker::Jail,
        Marker::Jailed,
        Marker::ReleasedFromJail,
        Marker::Property,
        Marker::Advertisement,
        Marker::Ad,
        Marker::Government,
        Marker::Gov,
        Marker::News,
        Marker::WeazelNews,
        Marker::Admin,
        Marker::AdminOoc,
        Marker::Report,
        Marker::Support,
        Marker::Vehicle,
        Marker::YourVehicle,
        Marker::Weapon,
        Marker::Equipped,
        Marker::Help,
        Marker::Usage,
        Marker::Error,
        Marker::EmergencyCall,
        Marker::Call911,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            Marker::Says => " says",
            Marker::Shouts => " shouts",
            Marker::Whispers => " whispers",
            Marker::Low => "[low]",
            Marker::Lower => "[lower]",
            Marker::Phone => "(phone)",
            Marker::Info => "[info]",
            Marker::Sms => "[sms ",
            Marker::Intercom => "intercom",
            Marker::Vessel => "[vessel traffic service]",
            Marker::Cashtap => "[cashtap]",
            Marker::Bank => "[bank]",
            Marker::DrugLab => "[drug lab]",
            Marker::CharacterKill => "[character kill]",
            Marker::CharacterKilled => "character killed",
            Marker::Robbery => "[robbery]",
            Marker::Jail => "[jail]",
            Marker::Jailed => "you have been jailed",
            Marker::ReleasedFromJail => "released from jail",
            Marker::Property => "[property]",
            Marker::Advertisement => "[advertisement]",
            Marker::Ad => "[ad]",
            Marker::Government => "[government]",
            Marker::Gov => "[gov]",
            Marker::News => "[news]",
            Marker::WeazelNews => "[weazel news]",
            Marker::Admin => "[admin]",
            Marker::AdminOoc => "(( admin",
            Marker::Report => "[report]",
            Marker::Support => "[support]",
            Marker::Vehicle => "[vehicle]",
            Marker::YourVehicle => "your vehicle",
            Marker::Weapon => "[weapon]",
            Marker::Equipped => "you have equipped",
            Marker::Help => "[help]",
            Marker::Usage => "usage:",
            Marker::Error => "[error]",
            Marker::EmergencyCall => "[emergency call]",
            Marker::Call911 => "911 call",
        }
    }

    fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

/// One input line prepared for rule evaluation.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub text: &'a str,
    pub lower: String,
    markers: u64,
}

impl<'a> Line<'a> {
    pub fn has(&self, marker: Marker) -> bool {
        self.markers & marker.bit() != 0
    }

    /// Case-insensitive prefix test.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.lower.starts_with(&prefix.to_lowercase())
    }
}

/// Result of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Name of the rule that produced the markup ("inline" for the fallthrough)
    pub rule: &'static str,
    pub markup: String,
}

/// Ordered rule cascade plus the marker automaton.
pub struct Classifier {
    rules: Vec<Rule>,
    markers: Option<AhoCorasick>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self::with_rules(rules::default_rules())
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        let patterns: Vec<&str> = Marker::ALL.iter().map(|m| m.pattern()).collect();
        let markers = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| tracing::warn!("Marker automaton unavailable, using slow path: {}", e))
            .ok();

        Self { rules, markers }
    }

    /// Scan a line for markers.
    pub fn prepare<'a>(&self, text: &'a str) -> Line<'a> {
        let lower = text.to_lowercase();
        let mut bits = 0u64;

        match &self.markers {
            Some(ac) => {
                for mat in ac.find_overlapping_iter(text) {
                    if let Some(marker) = Marker::ALL.get(mat.pattern().as_usize()) {
                        bits |= marker.bit();
                    }
                }
            }
            None => {
                for marker in Marker::ALL {
                    if lower.contains(marker.pattern()) {
                        bits |= marker.bit();
                    }
                }
            }
        }

        Line {
            text,
            lower,
            markers: bits,
        }
    }

    /// Classify a timestamp-stripped line. Never fails; unknown shapes fall
    /// through to the inline color-code formatter.
    pub fn classify(&self, text: &str, ctx: &ClassifyContext) -> Classified {
        let line = self.prepare(text);

        for rule in &self.rules {
            if (rule.matches)(&line) {
                tracing::trace!("line matched rule '{}'", rule.name);
                return Classified {
                    rule: rule.name,
                    markup: (rule.render)(&line, ctx),
                };
            }
        }

        Classified {
            rule: "inline",
            markup: rules::format_inline(text),
        }
    }
}
