//! The ordered rule table and the markup helpers the rules share.

use super::{ClassifyContext, Line, Marker};
use crate::markup;
use crate::theme::HEX_CLASS_PREFIX;
use regex::Regex;
use std::sync::LazyLock;

/// A named (predicate, handler) pair.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&Line<'_>) -> bool,
    pub render: fn(&Line<'_>, &ClassifyContext) -> String,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

macro_rules! regex {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect(stringify!($name)));
    };
}

regex!(RADIO, r"^\[S: (\d+) \| CH: ([^\]]+)\] (.*)$");
regex!(DEPARTMENT, r"^\*\* \[[^\]]+\] ");
regex!(EMERGENCY_FIELD, r"^(Log Number|Phone Number|Location|Situation|Caller):\s?(.*)$");
regex!(TO_SECTION, r"(?i)\s*\(to [^)]*\)");
regex!(SMS, r"(?i)^(\[SMS (?:from|to) [^\]]*\]:?)\s?(.*)$");
regex!(
    PHONE_LIFECYCLE,
    r"(?i)^(your phone is ringing|you have answered the call|the call has ended|you hung up|the other party (?:has )?(?:declined|hung up)|you are calling|you have declined the call|incoming call from|you missed a call)"
);
regex!(DO_ACTION, r"^\* .+\(\(.+\)\)\*?$");
regex!(PM, r"(?i)^\(\( ?PM (?:from|to) ");
regex!(
    INFO_SHARED,
    r"(?i)^(\[INFO\]:?)\s?(You have shared your (?:number|contact) with )(.+?)(\.?)$"
);
regex!(
    INFO_RECEIVED,
    r"(?i)^(\[INFO\]:?)\s?(.+?)( has shared (?:their|his|her) (?:number|contact).*)$"
);
regex!(INFO_HEADER, r"(?i)^(\[INFO\]:?)\s?(.*)$");
regex!(DATE_STAMP, r"(?i)\d{1,2}/(?:[a-z]{3}|\d{1,2})/\d{4}|\d{4}-\d{2}-\d{2}");
regex!(
    GOODS_RECEIVED,
    r"(?i)^(You (?:have )?received )(\d+)(x? )(.+?)( from )(.+?)(\.?)$"
);
regex!(
    GOODS_GIVEN,
    r"(?i)^(You (?:have )?(?:given|gave) )(\d+)(x? )(.+?)( to )(.+?)(\.?)$"
);
regex!(
    INVENTORY,
    r"(?i)^You (?:have )?(?:took|taken|put|dropped|picked up|stored|retrieved) "
);
regex!(
    MONEY_RECEIVED,
    r"(?i)^(You have received )(\$[\d,]+(?:\.\d{1,3})?)( from )(.+?)(\.?)$"
);
regex!(
    MONEY_GIVEN,
    r"(?i)^(You (?:have )?(?:paid|given|gave) )(\$[\d,]+(?:\.\d{1,3})?)( to )(.+?)(\.?)$"
);
regex!(
    MONEY_FROM,
    r"(?i)^(.+?)( has (?:paid|given) you )(\$[\d,]+(?:\.\d{1,3})?)(.*)$"
);
regex!(AMOUNT, r"\$[\d,]+(?:\.\d{1,3})?");
regex!(COUNT, r"\b\d+\b");
regex!(BRACKET_HEADER, r"^(\[[^\]]+\]:?)\s?(.*)$");
regex!(PLATE, r"(?i)\b(?:plate|plates)\s+([A-Z0-9]{2,8})\b");
regex!(TIMESTAMPED, r"^\[\d{1,2}:\d{2}\] ");
regex!(COLOR_CODE, r"\{([0-9A-Fa-f]{6})\}");

/// Build markup from (class, raw text) pieces, skipping empty text.
pub fn segments(parts: &[(&str, &str)]) -> String {
    parts.iter().map(|(class, text)| markup::span(class, text)).collect()
}

/// Wrap `text` in `base`, re-coloring every `re` match with `class`.
pub fn highlight(text: &str, base: &str, re: &Regex, class: &str) -> String {
    let mut out = String::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&markup::span(base, &text[last..m.start()]));
        out.push_str(&markup::span(class, m.as_str()));
        last = m.end();
    }
    out.push_str(&markup::span(base, &text[last..]));
    out
}

/// Replace inline `{RRGGBB}` codes with color spans; text before the first
/// code is white. Also the fallthrough for unrecognized lines.
pub fn format_inline(text: &str) -> String {
    let mut out = String::new();
    let mut class = String::from("white");
    let mut last = 0;

    for caps in COLOR_CODE.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&markup::span(&class, &text[last..m.start()]));
        class = format!("{}{}", HEX_CLASS_PREFIX, caps[1].to_ascii_lowercase());
        last = m.end();
    }
    out.push_str(&markup::span(&class, &text[last..]));
    out
}

/// The speaker part of a speech line: everything before `verb`, with any
/// `(to X)` section removed.
pub fn speaker(line: &Line<'_>, verb: &str) -> String {
    let cut = line.lower.find(verb).unwrap_or(line.lower.len());
    let head = line.text.get(..cut).unwrap_or(line.text);
    TO_SECTION.replace_all(head, "").trim().to_string()
}

fn whole(class: &str, line: &Line<'_>) -> String {
    markup::span(class, line.text)
}

/// `[HEADER] rest` with the header in `header_class`.
fn header_line(line: &Line<'_>, header_class: &str, rest_class: &str) -> String {
    match BRACKET_HEADER.captures(line.text) {
        Some(caps) => {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let sep = if rest.is_empty() { "" } else { " " };
            format!(
                "{}{}",
                markup::span(header_class, &format!("{}{}", &caps[1], sep)),
                markup::span(rest_class, rest)
            )
        }
        None => whole(rest_class, line),
    }
}

fn speech_shade(line: &Line<'_>, ctx: &ClassifyContext, verb: &str, own: &str, other: &str) -> String {
    let who = speaker(line, verb);
    whole(if ctx.is_own(&who) { own } else { other }, line)
}

fn render_radio(line: &Line<'_>, ctx: &ClassifyContext) -> String {
    let Some(caps) = RADIO.captures(line.text) else {
        return format_inline(line.text);
    };
    let body = caps.get(3).map_or("", |m| m.as_str());
    let lower = body.to_lowercase();
    let who = match lower.find(" says") {
        Some(i) => body.get(..i).unwrap_or(body),
        None => body,
    };
    let class = if ctx.is_own(who) { "radio" } else { "radio2" };
    whole(class, line)
}

fn render_emergency_field(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match EMERGENCY_FIELD.captures(line.text) {
        Some(caps) => segments(&[
            ("blue", &*format!("{}: ", &caps[1])),
            ("white", caps.get(2).map_or("", |m| m.as_str())),
        ]),
        None => whole("white", line),
    }
}

fn render_sms(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match SMS.captures(line.text) {
        Some(caps) => {
            let body = caps.get(2).map_or("", |m| m.as_str());
            let sep = if body.is_empty() { "" } else { " " };
            segments(&[("yellow", &*format!("{}{}", &caps[1], sep)), ("white", body)])
        }
        None => whole("yellow", line),
    }
}

fn render_info_shared(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match INFO_SHARED.captures(line.text) {
        Some(caps) => segments(&[
            ("blue", &*format!("{} ", &caps[1])),
            ("white", &caps[2]),
            ("green", &caps[3]),
            ("white", caps.get(4).map_or("", |m| m.as_str())),
        ]),
        None => header_line(line, "blue", "white"),
    }
}

fn render_info_received(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match INFO_RECEIVED.captures(line.text) {
        Some(caps) => segments(&[
            ("blue", &*format!("{} ", &caps[1])),
            ("green", &caps[2]),
            ("white", &caps[3]),
        ]),
        None => header_line(line, "blue", "white"),
    }
}

fn render_info(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match INFO_HEADER.captures(line.text) {
        Some(caps) => {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let sep = if rest.is_empty() { "" } else { " " };
            segments(&[("blue", &*format!("{}{}", &caps[1], sep)), ("white", rest)])
        }
        None => whole("white", line),
    }
}

fn render_goods(re: &Regex, line: &Line<'_>) -> String {
    match re.captures(line.text) {
        Some(caps) => segments(&[
            ("white", &caps[1]),
            ("green", &caps[2]),
            ("white", &caps[3]),
            ("yellow", &caps[4]),
            ("white", &caps[5]),
            ("white", &caps[6]),
            ("white", caps.get(7).map_or("", |m| m.as_str())),
        ]),
        None => whole("white", line),
    }
}

fn render_money(re: &Regex, line: &Line<'_>) -> String {
    match re.captures(line.text) {
        Some(caps) => segments(&[
            ("white", &caps[1]),
            ("green", &caps[2]),
            ("white", &caps[3]),
            ("white", &caps[4]),
            ("white", caps.get(5).map_or("", |m| m.as_str())),
        ]),
        None => highlight(line.text, "white", &AMOUNT, "green"),
    }
}

fn render_money_from(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match MONEY_FROM.captures(line.text) {
        Some(caps) => segments(&[
            ("white", &caps[1]),
            ("white", &caps[2]),
            ("green", &caps[3]),
            ("white", caps.get(4).map_or("", |m| m.as_str())),
        ]),
        None => highlight(line.text, "white", &AMOUNT, "green"),
    }
}

fn render_cashtap(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match BRACKET_HEADER.captures(line.text) {
        Some(caps) => {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let sep = if rest.is_empty() { "" } else { " " };
            format!(
                "{}{}",
                markup::span("green", &*format!("{}{}", &caps[1], sep)),
                highlight(rest, "white", &AMOUNT, "green")
            )
        }
        None => highlight(line.text, "white", &AMOUNT, "green"),
    }
}

fn render_vehicle(line: &Line<'_>, _ctx: &ClassifyContext) -> String {
    match PLATE.captures(line.text) {
        Some(caps) => match caps.get(1) {
            Some(plate) => segments(&[
                ("white", &line.text[..plate.start()]),
                ("yellow", plate.as_str()),
                ("white", &line.text[plate.end()..]),
            ]),
            None => whole("white", line),
        },
        None => whole("white", line),
    }
}

fn is_ooc(line: &Line<'_>) -> bool {
    let t = line.text.trim();
    t.starts_with("((") && t.ends_with("))")
}

fn starts_any(line: &Line<'_>, markers: &[Marker]) -> bool {
    markers.iter().any(|m| line.lower.trim_start().starts_with(m.pattern()))
}

/// The rule cascade, in evaluation order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "radio",
            matches: |l| RADIO.is_match(l.text),
            render: render_radio,
        },
        Rule {
            name: "department_radio",
            matches: |l| DEPARTMENT.is_match(l.text),
            render: |l, _| whole("dep", l),
        },
        Rule {
            name: "emergency_call",
            matches: |l| EMERGENCY_FIELD.is_match(l.text),
            render: render_emergency_field,
        },
        Rule {
            name: "emergency_header",
            matches: |l| l.has(Marker::EmergencyCall) || l.has(Marker::Call911),
            render: |l, _| whole("blue", l),
        },
        Rule {
            name: "phone_speech",
            matches: |l| l.has(Marker::Says) && l.has(Marker::Phone),
            render: |l, _| whole("yellow", l),
        },
        Rule {
            name: "speech_lower",
            matches: |l| l.has(Marker::Says) && l.has(Marker::Lower),
            render: |l, ctx| speech_shade(l, ctx, " says", "grey", "darkgrey"),
        },
        Rule {
            name: "speech_low",
            matches: |l| l.has(Marker::Says) && l.has(Marker::Low),
            render: |l, ctx| speech_shade(l, ctx, " says", "lightgrey", "grey"),
        },
        Rule {
            name: "vehicle_whisper",
            matches: |l| l.starts_with("(car)") && l.has(Marker::Whispers),
            render: |l, _| whole("carwhisper", l),
        },
        Rule {
            name: "whisper",
            matches: |l| l.has(Marker::Whispers),
            render: |l, _| whole("whisper", l),
        },
        Rule {
            name: "shout",
            matches: |l| l.lower.contains(" shouts:") || l.lower.contains(" shouts ("),
            render: |l, ctx| speech_shade(l, ctx, " shouts", "white", "lightgrey"),
        },
        Rule {
            name: "speech",
            matches: |l| l.lower.contains(" says:") || l.lower.contains(" says ("),
            render: |l, ctx| speech_shade(l, ctx, " says", "white", "lightgrey"),
        },
        Rule {
            name: "sms",
            matches: |l| l.has(Marker::Sms) && SMS.is_match(l.text),
            render: render_sms,
        },
        Rule {
            name: "phone_lifecycle",
            matches: |l| PHONE_LIFECYCLE.is_match(l.text),
            render: |l, _| whole("yellow", l),
        },
        Rule {
            name: "do_action",
            matches: |l| DO_ACTION.is_match(l.text),
            render: |l, _| whole("me", l),
        },
        Rule {
            name: "me_action",
            matches: |l| l.text.starts_with("* "),
            render: |l, _| whole("me", l),
        },
        Rule {
            name: "ame_action",
            matches: |l| l.text.starts_with("> "),
            render: |l, _| whole("ame", l),
        },
        Rule {
            name: "pm",
            matches: |l| PM.is_match(l.text),
            render: |l, _| whole("pm", l),
        },
        Rule {
            name: "admin",
            matches: |l| starts_any(l, &[Marker::Admin, Marker::AdminOoc]),
            render: |l, _| whole("death", l),
        },
        Rule {
            name: "local_ooc",
            matches: is_ooc,
            render: |l, _| whole("ooc", l),
        },
        Rule {
            name: "info_contact_shared",
            matches: |l| l.has(Marker::Info) && INFO_SHARED.is_match(l.text),
            render: render_info_shared,
        },
        Rule {
            name: "info_contact_received",
            matches: |l| l.has(Marker::Info) && INFO_RECEIVED.is_match(l.text),
            render: render_info_received,
        },
        Rule {
            name: "info_date",
            matches: |l| starts_any(l, &[Marker::Info]) && DATE_STAMP.is_match(l.text),
            render: render_info,
        },
        Rule {
            name: "info",
            matches: |l| starts_any(l, &[Marker::Info]),
            render: render_info,
        },
        Rule {
            name: "vessel_traffic",
            matches: |l| starts_any(l, &[Marker::Vessel]),
            render: |l, _| whole("vessel", l),
        },
        Rule {
            name: "intercom",
            matches: |l| l.has(Marker::Intercom),
            render: |l, _| whole("intercom", l),
        },
        Rule {
            name: "goods_received",
            matches: |l| GOODS_RECEIVED.is_match(l.text),
            render: |l, _| render_goods(&GOODS_RECEIVED, l),
        },
        Rule {
            name: "goods_given",
            matches: |l| GOODS_GIVEN.is_match(l.text),
            render: |l, _| render_goods(&GOODS_GIVEN, l),
        },
        Rule {
            name: "inventory_action",
            matches: |l| INVENTORY.is_match(l.text),
            render: |l, _| highlight(l.text, "white", &COUNT, "green"),
        },
        Rule {
            name: "money_received",
            matches: |l| MONEY_RECEIVED.is_match(l.text),
            render: |l, _| render_money(&MONEY_RECEIVED, l),
        },
        Rule {
            name: "money_given",
            matches: |l| MONEY_GIVEN.is_match(l.text),
            render: |l, _| render_money(&MONEY_GIVEN, l),
        },
        Rule {
            name: "money_from",
            matches: |l| MONEY_FROM.is_match(l.text),
            render: render_money_from,
        },
        Rule {
            name: "cashtap",
            matches: |l| starts_any(l, &[Marker::Cashtap, Marker::Bank]),
            render: render_cashtap,
        },
        Rule {
            name: "drug_lab",
            matches: |l| starts_any(l, &[Marker::DrugLab]),
            render: |l, _| header_line(l, "orange", "white"),
        },
        Rule {
            name: "character_kill",
            matches: |l| l.has(Marker::CharacterKill) || l.has(Marker::CharacterKilled),
            render: |l, _| whole("death", l),
        },
        Rule {
            name: "robbery",
            matches: |l| starts_any(l, &[Marker::Robbery]),
            render: |l, _| whole("orange", l),
        },
        Rule {
            name: "jail",
            matches: |l| {
                starts_any(l, &[Marker::Jail]) || l.has(Marker::Jailed) || l.has(Marker::ReleasedFromJail)
            },
            render: |l, _| whole("orange", l),
        },
        Rule {
            name: "property",
            matches: |l| starts_any(l, &[Marker::Property]),
            render: |l, _| header_line(l, "green", "white"),
        },
        Rule {
            name: "advertisement",
            matches: |l| starts_any(l, &[Marker::Advertisement, Marker::Ad]),
            render: |l, _| whole("green", l),
        },
        Rule {
            name: "government",
            matches: |l| starts_any(l, &[Marker::Government, Marker::Gov]),
            render: |l, _| whole("blue", l),
        },
        Rule {
            name: "news",
            matches: |l| starts_any(l, &[Marker::News, Marker::WeazelNews]),
            render: |l, _| whole("orange", l),
        },
        Rule {
            name: "report",
            matches: |l| starts_any(l, &[Marker::Report, Marker::Support]),
            render: |l, _| whole("yellow", l),
        },
        Rule {
            name: "vehicle_info",
            matches: |l| starts_any(l, &[Marker::Vehicle, Marker::YourVehicle]),
            render: render_vehicle,
        },
        Rule {
            name: "weapon",
            matches: |l| starts_any(l, &[Marker::Weapon, Marker::Equipped]),
            render: |l, _| whole("orange", l),
        },
        Rule {
            name: "help",
            matches: |l| starts_any(l, &[Marker::Help, Marker::Usage]),
            render: |l, _| whole("grey", l),
        },
        Rule {
            name: "error",
            matches: |l| starts_any(l, &[Marker::Error]),
            render: |l, _| whole("death", l),
        },
        Rule {
            name: "timestamped_system",
            matches: |l| TIMESTAMPED.is_match(l.text),
            render: |l, _| whole("grey", l),
        },
        Rule {
            name: "color_codes",
            matches: |l| COLOR_CODE.is_match(l.text),
            render: |l, _| format_inline(l.text),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, ClassifyContext};
    use pretty_assertions::assert_eq;

    fn run(text: &str, name: Option<&str>) -> (&'static str, String) {
        let c = Classifier::new().classify(text, &ClassifyContext::new(name));
        (c.rule, c.markup)
    }

    fn rule_of(text: &str) -> &'static str {
        run(text, None).0
    }

    fn span_classes(markup: &str) -> Vec<String> {
        markup::tokenize(markup)
            .into_iter()
            .filter_map(|t| match t {
                markup::Token::Open { raw, .. } => Some(markup::classes(raw).join(" ")),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_own_speech_is_white() {
        let (rule, out) = run("Alice says: Hello Bob", Some("Alice"));
        assert_eq!(rule, "speech");
        assert_eq!(out, "<span class=\"white\">Alice says: Hello Bob</span>");
        assert!(!out.contains("grey"));
    }

    #[test]
    fn test_speech_own_vs_other_with_to_section() {
        let cases = [
            ("Alice says: hi", Some("alice"), "white"),
            ("Alice says (to Bob): hi", Some("ALICE"), "white"),
            ("Bob says: hi", Some("Alice"), "lightgrey"),
            ("Bob says (to Alice): hi", Some("Alice"), "lightgrey"),
            ("Alice says: hi", None, "lightgrey"),
            ("Alice says (to Bob): hi", None, "lightgrey"),
        ];
        for (text, name, expected) in cases {
            let (_, out) = run(text, name);
            assert_eq!(span_classes(&out), vec![expected.to_string()], "{}", text);
        }
    }

    #[test]
    fn test_low_speech_shades() {
        let (rule, out) = run("Alice says [low]: psst", None);
        assert_eq!(rule, "speech_low");
        assert_eq!(span_classes(&out), vec!["grey"]);

        let (_, out) = run("Alice says [low]: psst", Some("Alice"));
        assert_eq!(span_classes(&out), vec!["lightgrey"]);
    }

    #[test]
    fn test_lower_speech_shades() {
        assert_eq!(span_classes(&run("Bob says [lower]: hm", Some("Bob")).1), vec!["grey"]);
        assert_eq!(span_classes(&run("Bob says [lower]: hm", None).1), vec!["darkgrey"]);
    }

    #[test]
    fn test_shout_uses_speech_shades() {
        assert_eq!(span_classes(&run("Alice shouts: Stop!", Some("Alice")).1), vec!["white"]);
        assert_eq!(span_classes(&run("Bob shouts: Stop!", Some("Alice")).1), vec!["lightgrey"]);
    }

    #[test]
    fn test_vehicle_whisper_differs_from_whisper() {
        assert_eq!(rule_of("(Car) Bob whispers: go left"), "vehicle_whisper");
        assert_eq!(rule_of("Bob whispers: go left"), "whisper");
        assert_eq!(span_classes(&run("(Car) Bob whispers: go", None).1), vec!["carwhisper"]);
        assert_eq!(span_classes(&run("Bob whispers: go", None).1), vec!["whisper"]);
    }

    #[test]
    fn test_radio_strict_header() {
        assert_eq!(rule_of("[S: 1 | CH: LSPD] Bob says: 10-4"), "radio");
        let (_, own) = run("[S: 1 | CH: LSPD] Alice Smith says: 10-4", Some("Alice"));
        assert_eq!(span_classes(&own), vec!["radio"]);
        let (_, other) = run("[S: 1 | CH: LSPD] Bob says: Alice copy", Some("Alice"));
        assert_eq!(span_classes(&other), vec!["radio2"]);
    }

    #[test]
    fn test_malformed_radio_falls_through() {
        assert_eq!(rule_of("[S: x | CH: LSPD] hello"), "inline");
        assert_eq!(rule_of("[S: 1 CH: LSPD] hello"), "inline");
    }

    #[test]
    fn test_radio_before_speech() {
        // "says:" is present but the radio header owns the line
        assert_eq!(rule_of("[S: 2 | CH: EMS] Bob says: en route"), "radio");
    }

    #[test]
    fn test_phone_speech_before_low() {
        assert_eq!(rule_of("Bob says [low] (phone): hello"), "phone_speech");
    }

    #[test]
    fn test_me_ame_do() {
        assert_eq!(rule_of("* Bob opens the door."), "me_action");
        assert_eq!(rule_of("* The door is open. (( Bob ))"), "do_action");
        assert_eq!(rule_of("> Bob nods."), "ame_action");
    }

    #[test]
    fn test_ooc_and_pm() {
        assert_eq!(rule_of("(( Bob: brb ))"), "local_ooc");
        assert_eq!(rule_of("(( PM from Bob (5): hey ))"), "pm");
        assert_eq!(rule_of("(( Admin Jane: stop ))"), "admin");
    }

    #[test]
    fn test_sms_header_and_body() {
        let (rule, out) = run("[SMS from Bob (555-1234)]: see you", None);
        assert_eq!(rule, "sms");
        assert_eq!(
            out,
            "<span class=\"yellow\">[SMS from Bob (555-1234)]: </span><span class=\"white\">see you</span>"
        );
    }

    #[test]
    fn test_phone_lifecycle() {
        assert_eq!(rule_of("Your phone is ringing."), "phone_lifecycle");
        assert_eq!(rule_of("The call has ended."), "phone_lifecycle");
    }

    #[test]
    fn test_info_contact_shared() {
        let (rule, out) = run("[INFO]: You have shared your number with Alice Smith.", None);
        assert_eq!(rule, "info_contact_shared");
        assert_eq!(span_classes(&out), vec!["blue", "white", "green", "white"]);
        assert!(out.contains("<span class=\"green\">Alice Smith</span>"));
    }

    #[test]
    fn test_info_received_and_plain_info() {
        assert_eq!(rule_of("[INFO] Bob has shared their contact with you."), "info_contact_received");
        assert_eq!(rule_of("[INFO]: [12/JAN/2024 - 10:00] Payday"), "info_date");
        assert_eq!(rule_of("[INFO]: Welcome back"), "info");
    }

    #[test]
    fn test_money_received_amount_is_green() {
        let (rule, out) = run("You have received $1,500 from Bob.", None);
        assert_eq!(rule, "money_received");
        assert!(out.contains("<span class=\"green\">$1,500</span>"));
        assert_eq!(markup::text_content(&out), "You have received $1,500 from Bob.");
    }

    #[test]
    fn test_goods_before_money() {
        assert_eq!(rule_of("You received 2 Burger from Bob."), "goods_received");
        assert_eq!(rule_of("You gave 3x Water to Bob."), "goods_given");
        assert_eq!(rule_of("You gave $300 to Bob."), "money_given");
        assert_eq!(rule_of("Bob has paid you $20."), "money_from");
    }

    #[test]
    fn test_inventory_counts_green() {
        let (rule, out) = run("You took 4 bullets from the trunk.", None);
        assert_eq!(rule, "inventory_action");
        assert!(out.contains("<span class=\"green\">4</span>"));
    }

    #[test]
    fn test_headers() {
        assert_eq!(rule_of("[DRUG LAB] Batch complete."), "drug_lab");
        assert_eq!(rule_of("[CHARACTER KILL] Bob"), "character_kill");
        assert_eq!(rule_of("[ROBBERY] Store alarm"), "robbery");
        assert_eq!(rule_of("You have been jailed for 20 minutes."), "jail");
        assert_eq!(rule_of("[VESSEL TRAFFIC SERVICE] Ship inbound"), "vessel_traffic");
        assert_eq!(rule_of("[CASHTAP] You sent $50"), "cashtap");
        assert_eq!(rule_of("[Front door intercom] Hello?"), "intercom");
        assert_eq!(rule_of("[12:30] Server restart"), "timestamped_system");
    }

    #[test]
    fn test_vehicle_plate_highlight() {
        let (rule, out) = run("Your vehicle with plate ABC123 was towed.", None);
        assert_eq!(rule, "vehicle_info");
        assert!(out.contains("<span class=\"yellow\">ABC123</span>"));
    }

    #[test]
    fn test_format_inline_codes() {
        assert_eq!(
            format_inline("a {FF0000}b{00ff00}"),
            "<span class=\"white\">a </span><span class=\"hex-ff0000\">b</span>"
        );
    }

    #[test]
    fn test_escaping_in_every_branch() {
        let (_, out) = run("Bob says: <script> & \"x\"", None);
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt; &amp;"));
    }

    #[test]
    fn test_speaker_strips_to_section() {
        let classifier = Classifier::new();
        let line = classifier.prepare("Bob (to Alice) says: hi");
        assert_eq!(speaker(&line, " says"), "Bob");
    }
}
